//! Byte streams that decoders read from.
//!
//! A stream is opened from "stream params": a protocol name, a path whose
//! meaning depends on the protocol, and optional protocol-specific options.
//! `file` is built in; applications can register more.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::error::{Error, Result};

/// Anything a decoder can read from.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// An open byte stream, ready to be decoded.
pub struct StreamHandle {
    reader: Box<dyn ReadSeek>,
    description: String,
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl StreamHandle {
    pub fn from_reader<R: Read + Seek + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
            description: "<reader>".to_string(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        tracing::debug!(path = %path.display(), "opened file stream");
        Ok(Self {
            reader: Box::new(BufReader::new(file)),
            description: path.display().to_string(),
        })
    }

    /// Open a stream through a registered protocol.
    pub fn from_stream_params(protocol: &str, path: &str, options: Option<&str>) -> Result<Self> {
        let factory = registry()
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(protocol)
            .cloned();
        match factory {
            Some(open) => open(path, options),
            None => Err(Error::UnknownProtocol(protocol.to_string())),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn into_reader(self) -> Box<dyn ReadSeek> {
        self.reader
    }
}

type Factory = Arc<dyn Fn(&str, Option<&str>) -> Result<StreamHandle> + Send + Sync>;

fn registry() -> &'static RwLock<HashMap<String, Factory>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Factory>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<String, Factory> = HashMap::new();
        map.insert(
            "file".to_string(),
            Arc::new(|path: &str, _options: Option<&str>| StreamHandle::from_file(path)),
        );
        RwLock::new(map)
    })
}

/// Make `name` usable with [`StreamHandle::from_stream_params`].
pub fn register_stream_protocol<F>(name: &str, factory: F) -> Result<()>
where
    F: Fn(&str, Option<&str>) -> Result<StreamHandle> + Send + Sync + 'static,
{
    let mut map = registry().write().unwrap_or_else(PoisonError::into_inner);
    if map.contains_key(name) {
        return Err(Error::ProtocolExists(name.to_string()));
    }
    map.insert(name.to_string(), Arc::new(factory));
    tracing::debug!(protocol = name, "registered stream protocol");
    Ok(())
}
