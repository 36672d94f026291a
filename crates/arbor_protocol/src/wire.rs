//! Binary data packets exchanged with storage nodes over UDP.
//!
//! One datagram carries exactly one packet. Multi-byte fields are big-endian.
//!
//! ```text
//! STORE    : u8 0x01, u8 idLen, id, u32 nextIp, u16 nextPort, u32 dataLen, data
//! RETRIEVE : u8 0x02, u8 idLen, id
//! DATA     : u8 0x03, u8 idLen, id, u32 nextIp, u16 nextPort, u8 corrupted, u32 dataLen, data
//! ACK      : u8 0x04, u8 idLen, id, u32 nextIp, u16 nextPort, u8 corrupted
//! ```

use std::net::{Ipv4Addr, SocketAddrV4};

use arbor_core::ChunkId;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::constants::{
    MAX_CHUNK_ID_LEN, MAX_DATAGRAM_SIZE, OP_ACK, OP_DATA, OP_RETRIEVE, OP_STORE,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("Empty datagram")]
    Empty,

    #[error("Unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("Truncated {field}: needed {needed} bytes but only {available} remain")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Chunk id is not valid UTF-8")]
    InvalidChunkId,

    #[error("Chunk id of {0} bytes exceeds the {MAX_CHUNK_ID_LEN} byte limit")]
    IdTooLong(usize),

    #[error("Packet of {0} bytes does not fit in a datagram")]
    PayloadTooLarge(usize),
}

/// Ask a node to store a chunk payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Store {
    pub chunk_id: ChunkId,
    /// Successor hint from the sender. Nodes compute their own.
    pub next: SocketAddrV4,
    pub data: Bytes,
}

/// Ask a node for a stored chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Retrieve {
    pub chunk_id: ChunkId,
}

/// A node's answer to [`Retrieve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Data {
    pub chunk_id: ChunkId,
    pub next: SocketAddrV4,
    pub corrupted: bool,
    pub data: Bytes,
}

/// A node's answer to [`Store`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ack {
    pub chunk_id: ChunkId,
    /// Ring successor of the storing node.
    pub next: SocketAddrV4,
    pub corrupted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Store(Store),
    Retrieve(Retrieve),
    Data(Data),
    Ack(Ack),
}

impl Packet {
    pub fn opcode(&self) -> u8 {
        match self {
            Packet::Store(_) => OP_STORE,
            Packet::Retrieve(_) => OP_RETRIEVE,
            Packet::Data(_) => OP_DATA,
            Packet::Ack(_) => OP_ACK,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Packet::Store(_) => "STORE",
            Packet::Retrieve(_) => "RETRIEVE",
            Packet::Data(_) => "DATA",
            Packet::Ack(_) => "ACK",
        }
    }

    pub fn chunk_id(&self) -> &ChunkId {
        match self {
            Packet::Store(p) => &p.chunk_id,
            Packet::Retrieve(p) => &p.chunk_id,
            Packet::Data(p) => &p.chunk_id,
            Packet::Ack(p) => &p.chunk_id,
        }
    }

    /// Serialise the packet into a single datagram.
    pub fn encode(&self) -> Result<Bytes, WireError> {
        let id = self.chunk_id().as_bytes();
        if id.len() > MAX_CHUNK_ID_LEN {
            return Err(WireError::IdTooLong(id.len()));
        }

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(self.opcode());
        buf.put_u8(id.len() as u8);
        buf.put_slice(id);

        match self {
            Packet::Store(p) => {
                put_addr(&mut buf, p.next);
                put_payload(&mut buf, &p.data)?;
            }
            Packet::Retrieve(_) => {}
            Packet::Data(p) => {
                put_addr(&mut buf, p.next);
                buf.put_u8(p.corrupted as u8);
                put_payload(&mut buf, &p.data)?;
            }
            Packet::Ack(p) => {
                put_addr(&mut buf, p.next);
                buf.put_u8(p.corrupted as u8);
            }
        }

        if buf.len() > MAX_DATAGRAM_SIZE {
            return Err(WireError::PayloadTooLarge(buf.len()));
        }
        Ok(buf.freeze())
    }

    fn encoded_len(&self) -> usize {
        let header = 2 + self.chunk_id().as_bytes().len();
        header
            + match self {
                Packet::Store(p) => 6 + 4 + p.data.len(),
                Packet::Retrieve(_) => 0,
                Packet::Data(p) => 6 + 1 + 4 + p.data.len(),
                Packet::Ack(_) => 6 + 1,
            }
    }

    /// Parse a datagram. Bytes past the end of the packet are ignored.
    pub fn decode(datagram: &[u8]) -> Result<Packet, WireError> {
        let mut buf = datagram;
        if !buf.has_remaining() {
            return Err(WireError::Empty);
        }

        let opcode = buf.get_u8();
        if !matches!(opcode, OP_STORE | OP_RETRIEVE | OP_DATA | OP_ACK) {
            return Err(WireError::UnknownOpcode(opcode));
        }

        let chunk_id = get_chunk_id(&mut buf)?;

        let packet = match opcode {
            OP_STORE => {
                let next = get_addr(&mut buf)?;
                let data = get_payload(&mut buf)?;
                Packet::Store(Store {
                    chunk_id,
                    next,
                    data,
                })
            }
            OP_RETRIEVE => Packet::Retrieve(Retrieve { chunk_id }),
            OP_DATA => {
                let next = get_addr(&mut buf)?;
                let corrupted = get_flag(&mut buf)?;
                let data = get_payload(&mut buf)?;
                Packet::Data(Data {
                    chunk_id,
                    next,
                    corrupted,
                    data,
                })
            }
            _ => {
                let next = get_addr(&mut buf)?;
                let corrupted = get_flag(&mut buf)?;
                Packet::Ack(Ack {
                    chunk_id,
                    next,
                    corrupted,
                })
            }
        };

        Ok(packet)
    }
}

fn put_addr(buf: &mut BytesMut, addr: SocketAddrV4) {
    buf.put_u32(u32::from(*addr.ip()));
    buf.put_u16(addr.port());
}

fn put_payload(buf: &mut BytesMut, data: &[u8]) -> Result<(), WireError> {
    let len = u32::try_from(data.len()).map_err(|_| WireError::PayloadTooLarge(data.len()))?;
    buf.put_u32(len);
    buf.put_slice(data);
    Ok(())
}

fn ensure(buf: &[u8], needed: usize, field: &'static str) -> Result<(), WireError> {
    if buf.len() < needed {
        return Err(WireError::Truncated {
            field,
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

fn get_chunk_id(buf: &mut &[u8]) -> Result<ChunkId, WireError> {
    ensure(buf, 1, "id length")?;
    let len = buf.get_u8() as usize;
    ensure(buf, len, "chunk id")?;
    let id = std::str::from_utf8(&buf[..len]).map_err(|_| WireError::InvalidChunkId)?;
    let chunk_id = ChunkId::from(id);
    buf.advance(len);
    Ok(chunk_id)
}

fn get_addr(buf: &mut &[u8]) -> Result<SocketAddrV4, WireError> {
    ensure(buf, 6, "next hop")?;
    let ip = Ipv4Addr::from(buf.get_u32());
    let port = buf.get_u16();
    Ok(SocketAddrV4::new(ip, port))
}

fn get_flag(buf: &mut &[u8]) -> Result<bool, WireError> {
    ensure(buf, 1, "corrupted flag")?;
    Ok(buf.get_u8() != 0)
}

fn get_payload(buf: &mut &[u8]) -> Result<Bytes, WireError> {
    ensure(buf, 4, "data length")?;
    let len = buf.get_u32() as usize;
    ensure(buf, len, "data")?;
    Ok(buf.copy_to_bytes(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 7), port)
    }

    #[test]
    fn test_store_layout() {
        let packet = Packet::Store(Store {
            chunk_id: ChunkId::from("f_chunk_0"),
            next: addr(5001),
            data: Bytes::from_static(b"hi"),
        });
        let encoded = packet.encode().unwrap();

        let mut expected = vec![0x01, 9];
        expected.extend_from_slice(b"f_chunk_0");
        expected.extend_from_slice(&[10, 0, 0, 7, 0x13, 0x89]);
        expected.extend_from_slice(&[0, 0, 0, 2]);
        expected.extend_from_slice(b"hi");
        assert_eq!(&encoded[..], &expected[..]);

        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }

    #[test]
    fn test_ack_and_data_layout() {
        let ack = Packet::Ack(Ack {
            chunk_id: ChunkId::from("x"),
            next: addr(5002),
            corrupted: true,
        });
        assert_eq!(
            &ack.encode().unwrap()[..],
            &[0x04, 1, b'x', 10, 0, 0, 7, 0x13, 0x8A, 1]
        );

        let data = Packet::Data(Data {
            chunk_id: ChunkId::from("x"),
            next: addr(5002),
            corrupted: false,
            data: Bytes::from_static(b"abc"),
        });
        let encoded = data.encode().unwrap();
        assert_eq!(
            &encoded[..],
            &[0x03, 1, b'x', 10, 0, 0, 7, 0x13, 0x8A, 0, 0, 0, 0, 3, b'a', b'b', b'c']
        );
        assert_eq!(Packet::decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_retrieve_layout() {
        let packet = Packet::Retrieve(Retrieve {
            chunk_id: ChunkId::from("ab"),
        });
        let encoded = packet.encode().unwrap();
        assert_eq!(&encoded[..], &[0x02, 2, b'a', b'b']);
        assert_eq!(Packet::decode(&encoded).unwrap(), packet);
    }

    #[test]
    fn test_nonzero_corrupted_byte_is_true() {
        let raw = [0x04, 1, b'x', 127, 0, 0, 1, 0x13, 0x88, 0x7F];
        match Packet::decode(&raw).unwrap() {
            Packet::Ack(ack) => assert!(ack.corrupted),
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn test_empty_and_unknown_opcode() {
        assert_eq!(Packet::decode(&[]), Err(WireError::Empty));
        assert_eq!(
            Packet::decode(&[0x09, 0]),
            Err(WireError::UnknownOpcode(0x09))
        );
    }

    #[test]
    fn test_truncated_fields() {
        // Missing id length
        assert!(matches!(
            Packet::decode(&[0x02]),
            Err(WireError::Truncated {
                field: "id length",
                ..
            })
        ));

        // Declared id longer than datagram
        assert!(matches!(
            Packet::decode(&[0x02, 5, b'a']),
            Err(WireError::Truncated {
                field: "chunk id",
                needed: 5,
                available: 1
            })
        ));

        // STORE cut inside the next hop
        assert!(matches!(
            Packet::decode(&[0x01, 1, b'a', 127, 0]),
            Err(WireError::Truncated {
                field: "next hop",
                ..
            })
        ));
    }

    #[test]
    fn test_declared_data_length_exceeds_datagram() {
        let mut raw = vec![0x01, 1, b'a', 127, 0, 0, 1, 0x13, 0x88];
        raw.extend_from_slice(&100u32.to_be_bytes());
        raw.extend_from_slice(&[0u8; 10]);

        assert_eq!(
            Packet::decode(&raw),
            Err(WireError::Truncated {
                field: "data",
                needed: 100,
                available: 10
            })
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut raw = Packet::Retrieve(Retrieve {
            chunk_id: ChunkId::from("a"),
        })
        .encode()
        .unwrap()
        .to_vec();
        raw.extend_from_slice(b"junk");

        assert_eq!(
            Packet::decode(&raw).unwrap().chunk_id(),
            &ChunkId::from("a")
        );
    }

    #[test]
    fn test_invalid_utf8_id() {
        assert_eq!(
            Packet::decode(&[0x02, 2, 0xFF, 0xFE]),
            Err(WireError::InvalidChunkId)
        );
    }

    #[test]
    fn test_encode_limits() {
        let long_id = Packet::Retrieve(Retrieve {
            chunk_id: ChunkId::from("a".repeat(256)),
        });
        assert_eq!(long_id.encode(), Err(WireError::IdTooLong(256)));

        let huge = Packet::Store(Store {
            chunk_id: ChunkId::from("a"),
            next: addr(0),
            data: Bytes::from(vec![0u8; MAX_DATAGRAM_SIZE]),
        });
        assert!(matches!(huge.encode(), Err(WireError::PayloadTooLarge(_))));
    }
}
