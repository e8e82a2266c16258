//! Contexts own a mixer and, unless headless, the device it plays to.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::dsp::spatial::{validate_orientation, DistanceParams, Vec3, DEFAULT_ORIENTATION};
use crate::dsp::PannerStrategy;
use crate::engine::command::{Command, ContextCommand, COMMAND_CAPACITY};
use crate::engine::event::{Event, EVENT_CAPACITY};
use crate::engine::route::{RouteConfig, MAX_FADE_TIME};
use crate::engine::{Mixer, BLOCK_SAMPLES};
use crate::error::{check_range, Error, Result};
use crate::handle::{Effect, Object, ObjectId, Source};
use crate::library::ensure_initialized;
use crate::runtime::output::AudioOutput;

#[derive(Debug, Clone, Copy)]
struct ContextProps {
    gain: f64,
    position: Vec3,
    orientation: [f64; 6],
    default_panner_strategy: PannerStrategy,
    default_distance: DistanceParams,
    events_enabled: bool,
}

impl Default for ContextProps {
    fn default() -> Self {
        Self {
            gain: 1.0,
            position: [0.0; 3],
            orientation: DEFAULT_ORIENTATION,
            default_panner_strategy: PannerStrategy::Stereo,
            default_distance: DistanceParams::default(),
            events_enabled: false,
        }
    }
}

struct ContextInner {
    mixer: Arc<Mutex<Mixer>>,
    commands: Mutex<Producer<Command>>,
    events: Mutex<Consumer<Event>>,
    live: Mutex<HashSet<ObjectId>>,
    next_id: AtomicU64,
    props: Mutex<ContextProps>,
    output: Option<AudioOutput>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        tracing::debug!(headless = self.output.is_none(), "context shutting down");
    }
}

/// The world everything else lives in: a listener, the objects around it and
/// the mixer that renders them.
///
/// Cloning is cheap and every clone refers to the same context. The audio
/// device is released once the last clone, and the last object created in
/// the context, are gone.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("headless", &self.inner.output.is_none())
            .field("props", &*self.props())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Context {
    /// Open the default output device and start playing.
    pub fn new() -> Result<Self> {
        Self::build(true)
    }

    /// A context with no device; pull audio with [`Context::generate_block`].
    pub fn new_headless() -> Result<Self> {
        Self::build(false)
    }

    fn build(with_device: bool) -> Result<Self> {
        ensure_initialized()?;
        let (command_tx, command_rx) = RingBuffer::new(COMMAND_CAPACITY);
        let (event_tx, event_rx) = RingBuffer::new(EVENT_CAPACITY);
        let mixer = Arc::new(Mutex::new(Mixer::new(command_rx, event_tx)));
        let output = if with_device {
            Some(AudioOutput::start(Arc::clone(&mixer))?)
        } else {
            None
        };
        tracing::debug!(headless = !with_device, "context created");
        Ok(Self {
            inner: Arc::new(ContextInner {
                mixer,
                commands: Mutex::new(command_tx),
                events: Mutex::new(event_rx),
                live: Mutex::new(HashSet::new()),
                next_id: AtomicU64::new(1),
                props: Mutex::new(ContextProps::default()),
                output,
            }),
        })
    }

    pub fn is_headless(&self) -> bool {
        self.inner.output.is_none()
    }

    /// Render the next block of interleaved stereo into `out`, which must
    /// hold exactly `BLOCK_SIZE * 2` samples.
    pub fn generate_block(&self, out: &mut [f32]) -> Result<()> {
        if !self.is_headless() {
            return Err(Error::NotHeadless);
        }
        if out.len() != BLOCK_SAMPLES {
            return Err(Error::BlockLength(out.len()));
        }
        lock(&self.inner.mixer).render_block(out);
        Ok(())
    }

    fn props(&self) -> MutexGuard<'_, ContextProps> {
        lock(&self.inner.props)
    }

    pub fn gain(&self) -> f64 {
        self.props().gain
    }

    pub fn set_gain(&self, gain: f64) -> Result<()> {
        check_range("gain", gain, 0.0, f64::MAX)?;
        self.props().gain = gain;
        self.submit(Command::Context(ContextCommand::Gain(gain)));
        Ok(())
    }

    /// Listener position.
    pub fn position(&self) -> Vec3 {
        self.props().position
    }

    pub fn set_position(&self, position: Vec3) -> Result<()> {
        if position.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidProperty {
                property: "position",
                reason: "components must be finite",
            });
        }
        self.props().position = position;
        self.submit(Command::Context(ContextCommand::ListenerPosition(position)));
        Ok(())
    }

    /// Listener orientation as `[at_x, at_y, at_z, up_x, up_y, up_z]`.
    pub fn orientation(&self) -> [f64; 6] {
        self.props().orientation
    }

    pub fn set_orientation(&self, orientation: [f64; 6]) -> Result<()> {
        validate_orientation(orientation)?;
        self.props().orientation = orientation;
        self.submit(Command::Context(ContextCommand::ListenerOrientation(
            orientation,
        )));
        Ok(())
    }

    pub fn default_panner_strategy(&self) -> PannerStrategy {
        self.props().default_panner_strategy
    }

    /// The strategy used by sources left on [`PannerStrategy::Delegate`].
    pub fn set_default_panner_strategy(&self, strategy: PannerStrategy) -> Result<()> {
        if strategy == PannerStrategy::Delegate {
            return Err(Error::InvalidProperty {
                property: "default_panner_strategy",
                reason: "the context default cannot itself delegate",
            });
        }
        self.props().default_panner_strategy = strategy;
        self.submit(Command::Context(ContextCommand::DefaultPannerStrategy(
            strategy,
        )));
        Ok(())
    }

    /// Distance parameters given to newly created 3D sources.
    pub fn default_distance_params(&self) -> DistanceParams {
        self.props().default_distance
    }

    pub fn set_default_distance_params(&self, params: DistanceParams) -> Result<()> {
        params.validate()?;
        self.props().default_distance = params;
        Ok(())
    }

    /// Send `source` into `effect`, or retarget an existing route.
    pub fn config_route(
        &self,
        source: &impl Source,
        effect: &impl Effect,
        config: RouteConfig,
    ) -> Result<()> {
        self.check_owned(source.context())?;
        self.check_owned(effect.context())?;
        config.validate()?;
        self.submit(Command::ConfigRoute {
            output: source.id(),
            input: effect.id(),
            config,
        });
        Ok(())
    }

    /// Fade a route out over `fade_out` seconds and drop it.
    pub fn remove_route(
        &self,
        source: &impl Source,
        effect: &impl Effect,
        fade_out: f64,
    ) -> Result<()> {
        self.check_owned(source.context())?;
        self.check_owned(effect.context())?;
        check_range("fade_out", fade_out, 0.0, MAX_FADE_TIME)?;
        self.submit(Command::RemoveRoute {
            output: source.id(),
            input: effect.id(),
            fade_time: fade_out,
        });
        Ok(())
    }

    pub fn enable_events(&self) {
        self.set_events_enabled(true);
    }

    pub fn disable_events(&self) {
        self.set_events_enabled(false);
    }

    pub fn events_enabled(&self) -> bool {
        self.props().events_enabled
    }

    fn set_events_enabled(&self, enabled: bool) {
        self.props().events_enabled = enabled;
        self.submit(Command::Context(ContextCommand::EventsEnabled(enabled)));
    }

    /// Next queued event whose source still exists.
    pub fn next_event(&self) -> Option<Event> {
        let mut events = lock(&self.inner.events);
        let live = lock(&self.inner.live);
        while let Ok(event) = events.pop() {
            if live.contains(&event.source) {
                return Some(event);
            }
            tracing::trace!(source = %event.source, "dropping event for destroyed object");
        }
        None
    }

    pub(crate) fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn check_owned(&self, other: &Context) -> Result<()> {
        if self.same_as(other) {
            Ok(())
        } else {
            Err(Error::ContextMismatch)
        }
    }

    pub(crate) fn allocate_id(&self) -> ObjectId {
        ObjectId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register(&self, id: ObjectId) {
        lock(&self.inner.live).insert(id);
    }

    pub(crate) fn destroy(&self, id: ObjectId) {
        lock(&self.inner.live).remove(&id);
        self.submit(Command::Destroy(id));
    }

    /// Queue `command` for the next block. When the ring is full the mixer
    /// is locked, drained and handed the command directly.
    pub(crate) fn submit(&self, command: Command) {
        let mut commands = lock(&self.inner.commands);
        if let Err(PushError::Full(command)) = commands.push(command) {
            tracing::trace!("command ring full, applying under the mixer lock");
            let mut mixer = lock(&self.inner.mixer);
            mixer.drain_commands();
            mixer.apply(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::initialize;

    #[test]
    fn test_headless_context_starts_empty() {
        let _guard = initialize().unwrap();
        let ctx = Context::new_headless().unwrap();
        assert!(ctx.is_headless());
        assert!(ctx.next_event().is_none());
        assert!(!ctx.events_enabled());
    }

    #[test]
    fn test_generate_block_checks_length() {
        let _guard = initialize().unwrap();
        let ctx = Context::new_headless().unwrap();
        let mut short = vec![0.0; 10];
        assert!(matches!(
            ctx.generate_block(&mut short),
            Err(Error::BlockLength(10))
        ));
        let mut block = vec![0.0; BLOCK_SAMPLES];
        assert!(ctx.generate_block(&mut block).is_ok());
    }

    #[test]
    fn test_getters_return_last_set() {
        let _guard = initialize().unwrap();
        let ctx = Context::new_headless().unwrap();
        ctx.set_gain(0.25).unwrap();
        ctx.set_position([1.0, 2.0, 3.0]).unwrap();
        ctx.set_default_panner_strategy(PannerStrategy::Hrtf).unwrap();
        assert_eq!(ctx.gain(), 0.25);
        assert_eq!(ctx.position(), [1.0, 2.0, 3.0]);
        assert_eq!(ctx.default_panner_strategy(), PannerStrategy::Hrtf);
    }

    #[test]
    fn test_rejects_bad_properties() {
        let _guard = initialize().unwrap();
        let ctx = Context::new_headless().unwrap();
        assert!(ctx.set_gain(-1.0).is_err());
        assert!(ctx.set_position([f64::NAN, 0.0, 0.0]).is_err());
        assert!(ctx
            .set_orientation([0.0, 1.0, 0.0, 0.0, 1.0, 0.0])
            .is_err());
        assert!(ctx
            .set_default_panner_strategy(PannerStrategy::Delegate)
            .is_err());
        assert_eq!(ctx.gain(), 1.0);
    }

    #[test]
    fn test_overflowing_the_command_ring_still_applies() {
        let _guard = initialize().unwrap();
        let ctx = Context::new_headless().unwrap();
        for i in 0..(COMMAND_CAPACITY * 3) {
            ctx.set_gain((i % 4) as f64 * 0.25).unwrap();
        }
        let mut block = vec![0.0; BLOCK_SAMPLES];
        ctx.generate_block(&mut block).unwrap();
    }
}
