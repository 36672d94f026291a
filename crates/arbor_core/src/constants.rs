/// Size of a file chunk in bytes. Every chunk except possibly the last is
/// exactly this long.
pub const CHUNK_SIZE: u64 = 8 * 1024; // 8 KiB

/// Most chunks a single file may be split into.
pub const MAX_FILE_CHUNKS: u64 = 1 << 17;
/// Largest file the coordinator will allocate, 1 GiB.
pub const MAX_FILE_SIZE: u64 = MAX_FILE_CHUNKS * CHUNK_SIZE;

/// Number of storage nodes in the default cluster.
pub const DEFAULT_NUM_NODES: u16 = 15;
/// UDP port of node 0; node `i` listens on `DEFAULT_BASE_PORT + i`.
pub const DEFAULT_BASE_PORT: u16 = 5000;
/// TCP port of the coordinator.
pub const DEFAULT_COORDINATOR_PORT: u16 = 4000;

/// Reed-Solomon codeword length in symbols (bytes).
pub const FEC_N: usize = 255;
/// Correctable symbol errors per codeword.
pub const FEC_T: usize = 16;
/// Parity symbols per codeword.
pub const FEC_PARITY: usize = 2 * FEC_T;
/// Data symbols per full codeword.
pub const FEC_K: usize = FEC_N - FEC_PARITY;

/// Data bytes covered by one parity byte in the detection-only codec.
pub const PARITY_BLOCK_SIZE: usize = 8;

/// Default per-bit flip probability of the simulated noisy channel.
pub const NOISE_PROB: f64 = 0.01;
