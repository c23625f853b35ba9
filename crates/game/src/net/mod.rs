mod framing;
mod protocol;
mod server;

pub use framing::{read_frame, write_frame};
pub use protocol::{
    ClientFrame, DEFAULT_PORT, FrameHeader, MAX_FRAME_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION,
    ProtocolError, RequestBody, ResponseBody, ServerFrame, ServerMessage,
};
pub use server::{ServerConfig, SessionServer};
