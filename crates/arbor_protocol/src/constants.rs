/// Largest UDP payload that fits in a single IPv4 datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Chunk ids are length-prefixed with a single byte.
pub const MAX_CHUNK_ID_LEN: usize = u8::MAX as usize;

pub const OP_STORE: u8 = 0x01;
pub const OP_RETRIEVE: u8 = 0x02;
pub const OP_DATA: u8 = 0x03;
pub const OP_ACK: u8 = 0x04;

pub const CMD_ALLOCATE_CHUNKS: &str = "ALLOCATE_CHUNKS";
pub const CMD_LOOKUP_FILE: &str = "LOOKUP_FILE";
pub const CMD_REGISTER_CHUNK_REPLICA: &str = "REGISTER_CHUNK_REPLICA";

pub const ERR_UNKNOWN_COMMAND: &str = "Unknown command or invalid arguments";
pub const ERR_FILE_NOT_FOUND: &str = "File not found";
pub const ERR_CHUNK_NOT_FOUND: &str = "Chunk not found";
pub const ERR_FILE_TOO_LARGE: &str = "File too large";
