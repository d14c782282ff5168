pub mod cipher;
pub mod config;
pub mod error;
pub mod playback;
pub mod rfc5987;

pub use cipher::{CipherError, QueryCipher};
pub use config::{
    load_vidgate_config, NetworkingSection, SecretSection, ServerSection, VideoplaybackSection,
    VidgateConfig,
};
pub use error::{ConfigError, Result};
pub use playback::{
    build_response, handle, outbound_headers, resolve, stream_chunks, user_agent_for, validate,
    ByteRange, ChunkPlan, FetchError, GoogleVideoClient, PlaybackContext, PlaybackError,
    PlaybackRequest, PlaybackResult, ResolveError, ResolvedLocation, ResponseEnvelope,
    UpstreamClient, UpstreamError, UpstreamResponse, ValidatedFields, ValidationError,
    CHUNK_POST_BODY, MAX_REDIRECT_HOPS,
};
pub use rfc5987::encode_value_chars;
