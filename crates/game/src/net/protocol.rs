use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::session::{JoinedSession, NetworkEvent, PlayerId, SessionConfig, SessionId};

pub const MAX_FRAME_SIZE: usize = 64 * 1024;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x43554245;
pub const DEFAULT_PORT: u16 = 27016;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct FrameHeader {
    pub magic: u32,
    pub version: u32,
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
        }
    }
}

impl FrameHeader {
    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum RequestBody {
    SignIn {
        installation_id: u64,
        profile: String,
    },
    CreateOrJoin {
        config: SessionConfig,
    },
    Leave {
        session_id: SessionId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ResponseBody {
    SignedIn { player_id: PlayerId },
    Joined(JoinedSession),
    Left,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum ServerMessage {
    Response { request_id: u32, body: ResponseBody },
    Event(NetworkEvent),
}

/// Client to server.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ClientFrame {
    pub header: FrameHeader,
    pub request_id: u32,
    pub body: RequestBody,
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct ServerFrame {
    pub header: FrameHeader,
    pub message: ServerMessage,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("bad frame header (magic {magic:#x}, version {version})")]
    BadHeader { magic: u32, version: u32 },
    #[error("frame of {0} bytes exceeds the 65536 byte limit")]
    FrameTooLarge(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn check_header(header: &FrameHeader) -> Result<(), ProtocolError> {
    if header.is_valid() {
        Ok(())
    } else {
        Err(ProtocolError::BadHeader {
            magic: header.magic,
            version: header.version,
        })
    }
}

// Frames arrive in plain byte buffers; rkyv validation wants them aligned.
fn aligned(data: &[u8]) -> AlignedVec {
    let mut buffer = AlignedVec::with_capacity(data.len());
    buffer.extend_from_slice(data);
    buffer
}

impl ClientFrame {
    pub fn new(request_id: u32, body: RequestBody) -> Self {
        Self {
            header: FrameHeader::default(),
            request_id,
            body,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ProtocolError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(ProtocolError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, ProtocolError> {
        let buffer = aligned(data);
        let frame = rkyv::from_bytes::<Self, rancor::Error>(&buffer)
            .map_err(ProtocolError::Deserialize)?;
        check_header(&frame.header)?;
        Ok(frame)
    }
}

impl ServerFrame {
    pub fn response(request_id: u32, body: ResponseBody) -> Self {
        Self {
            header: FrameHeader::default(),
            message: ServerMessage::Response { request_id, body },
        }
    }

    pub fn event(event: NetworkEvent) -> Self {
        Self {
            header: FrameHeader::default(),
            message: ServerMessage::Event(event),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ProtocolError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(ProtocolError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, ProtocolError> {
        let buffer = aligned(data);
        let frame = rkyv::from_bytes::<Self, rancor::Error>(&buffer)
            .map_err(ProtocolError::Deserialize)?;
        check_header(&frame.header)?;
        Ok(frame)
    }
}
