// Purpose - getting encoded audio in from the outside world

pub mod decoder;
pub mod stream;

pub use decoder::{decode_all, open_decoder, AudioDecoder, WavDecoder};
pub use stream::{register_stream_protocol, ReadSeek, StreamHandle};
