use std::sync::Arc;

use super::{impl_source_common, SourceProps, SourceSlot};
use crate::context::Context;
use crate::engine::command::Command;
use crate::error::Result;
use crate::handle::{impl_object, HandleInner, Source};
use crate::library::ensure_initialized;

#[derive(Debug, Clone, Copy, Default)]
struct DirectProps {
    common: SourceProps,
}

/// Plays generators straight to the output with no panning: mono goes to
/// both channels, stereo stays stereo and extra channels are dropped.
#[derive(Clone)]
pub struct DirectSource {
    inner: Arc<HandleInner<DirectProps>>,
}

impl_object!(DirectSource, Source);
impl_source_common!(DirectSource);

impl DirectSource {
    pub fn new(context: &Context) -> Result<Self> {
        ensure_initialized()?;
        let id = context.allocate_id();
        let inner = HandleInner::register(
            context,
            id,
            DirectProps::default(),
            Command::InsertSource {
                id,
                slot: Box::new(SourceSlot::direct()),
            },
        );
        tracing::debug!(%id, "direct source created");
        Ok(Self {
            inner: Arc::new(inner),
        })
    }
}
