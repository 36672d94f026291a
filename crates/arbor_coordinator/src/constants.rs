/// Longest request line accepted from a client.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;
