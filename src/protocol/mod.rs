//! Protocol Module
//!
//! Fixed-width binary framing shared by the engine and the client session.
//!
//! Every frame is exactly [`FRAME_SIZE`] bytes. Requests carry no identifier:
//! the response to a request is the next frame read after it was written, so
//! both sides keep strict request/response alternation.

mod frame;
mod reassembler;


pub use frame::{
    decode_response, encode_get, encode_insert, encode_remove, Command, Frame, Request, Response,
    COMMAND_WIDTH, FRAME_SIZE, INSERT_KEY_WIDTH, LOOKUP_KEY_WIDTH, RESPONSE_PAYLOAD_WIDTH,
    TIMESTAMP_WIDTH, TTL_WIDTH, VALUE_WIDTH,
};
pub use reassembler::{FrameAssembler, FrameReader};
