pub(crate) mod checksum;
pub(crate) mod family;
pub(crate) mod packet;
pub(crate) mod sequence_number;
