use std::sync::Arc;

use super::{impl_source_common, refresh_panner, SourceProps, SourceSlot};
use crate::context::Context;
use crate::dsp::panner::Panner;
use crate::dsp::PannerStrategy;
use crate::engine::command::{Command, SourceCommand};
use crate::engine::Listener;
use crate::error::{check_range, Result};
use crate::handle::{impl_object, HandleInner, Source};
use crate::library::ensure_initialized;

/// Audio-side panning state. Angles and scalar are kept apart; whichever
/// was written last drives the panner.
pub(crate) struct PannedState {
    strategy: PannerStrategy,
    panner: Panner,
    azimuth: f64,
    elevation: f64,
    scalar: f64,
    use_scalar: bool,
    dirty: bool,
}

impl PannedState {
    pub(crate) fn new(strategy: PannerStrategy) -> Self {
        Self {
            strategy,
            panner: Panner::new(strategy),
            azimuth: 0.0,
            elevation: 0.0,
            scalar: 0.0,
            use_scalar: false,
            dirty: true,
        }
    }

    pub(crate) fn run(&mut self, input: &[f32], out: &mut [f32], listener: &Listener) {
        if refresh_panner(&mut self.panner, self.strategy, listener.default_strategy) {
            self.dirty = true;
        }
        if self.dirty {
            if self.use_scalar {
                self.panner.set_scalar(self.scalar);
            } else {
                self.panner.set_angles(self.azimuth, self.elevation);
            }
            self.dirty = false;
        }
        self.panner.run(input, out);
    }

    pub(crate) fn apply(&mut self, command: SourceCommand) {
        match command {
            SourceCommand::PannerStrategy(strategy) => self.strategy = strategy,
            SourceCommand::Azimuth(azimuth) => {
                self.azimuth = azimuth;
                self.use_scalar = false;
            }
            SourceCommand::Elevation(elevation) => {
                self.elevation = elevation;
                self.use_scalar = false;
            }
            SourceCommand::PanningScalar(scalar) => {
                self.scalar = scalar;
                self.use_scalar = true;
            }
            _ => return,
        }
        self.dirty = true;
    }
}

#[derive(Debug, Clone, Copy)]
struct PannedProps {
    common: SourceProps,
    strategy: PannerStrategy,
    azimuth: f64,
    elevation: f64,
    panning_scalar: f64,
}

/// Mono source panned by angle or by a left/right scalar. Whichever was
/// written last wins.
#[derive(Clone)]
pub struct PannedSource {
    inner: Arc<HandleInner<PannedProps>>,
}

impl_object!(PannedSource, Source);
impl_source_common!(PannedSource);

impl PannedSource {
    pub fn new(context: &Context) -> Result<Self> {
        Self::with_strategy(context, PannerStrategy::Delegate)
    }

    pub fn with_strategy(context: &Context, strategy: PannerStrategy) -> Result<Self> {
        ensure_initialized()?;
        let id = context.allocate_id();
        let inner = HandleInner::register(
            context,
            id,
            PannedProps {
                common: SourceProps::default(),
                strategy,
                azimuth: 0.0,
                elevation: 0.0,
                panning_scalar: 0.0,
            },
            Command::InsertSource {
                id,
                slot: Box::new(SourceSlot::panned(PannedState::new(strategy))),
            },
        );
        tracing::debug!(%id, ?strategy, "panned source created");
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn panner_strategy(&self) -> PannerStrategy {
        self.inner.props().strategy
    }

    pub fn set_panner_strategy(&self, strategy: PannerStrategy) {
        self.inner.props().strategy = strategy;
        self.send(SourceCommand::PannerStrategy(strategy));
    }

    /// Degrees clockwise from straight ahead, [0, 360].
    pub fn azimuth(&self) -> f64 {
        self.inner.props().azimuth
    }

    pub fn set_azimuth(&self, azimuth: f64) -> Result<()> {
        check_range("azimuth", azimuth, 0.0, 360.0)?;
        self.inner.props().azimuth = azimuth;
        self.send(SourceCommand::Azimuth(azimuth));
        Ok(())
    }

    /// Degrees above the horizon, [-90, 90].
    pub fn elevation(&self) -> f64 {
        self.inner.props().elevation
    }

    pub fn set_elevation(&self, elevation: f64) -> Result<()> {
        check_range("elevation", elevation, -90.0, 90.0)?;
        self.inner.props().elevation = elevation;
        self.send(SourceCommand::Elevation(elevation));
        Ok(())
    }

    /// -1 is hard left, 1 hard right.
    pub fn panning_scalar(&self) -> f64 {
        self.inner.props().panning_scalar
    }

    pub fn set_panning_scalar(&self, scalar: f64) -> Result<()> {
        check_range("panning_scalar", scalar, -1.0, 1.0)?;
        self.inner.props().panning_scalar = scalar;
        self.send(SourceCommand::PanningScalar(scalar));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BLOCK_SIZE;

    fn render(state: &mut PannedState, listener: &Listener) -> Vec<f32> {
        let mut out = vec![0.0; BLOCK_SIZE * 2];
        state.run(&[1.0; BLOCK_SIZE], &mut out, listener);
        out
    }

    fn energy(out: &[f32], ch: usize) -> f32 {
        out.chunks_exact(2).map(|f| f[ch] * f[ch]).sum()
    }

    #[test]
    fn test_scalar_hard_right() {
        let mut state = PannedState::new(PannerStrategy::Stereo);
        state.apply(SourceCommand::PanningScalar(1.0));
        let listener = Listener::default();
        render(&mut state, &listener);
        let out = render(&mut state, &listener);
        assert!(energy(&out, 0) < 1e-6);
        assert!(energy(&out, 1) > 100.0);
    }

    #[test]
    fn test_last_write_wins() {
        let mut state = PannedState::new(PannerStrategy::Stereo);
        state.apply(SourceCommand::PanningScalar(1.0));
        state.apply(SourceCommand::Azimuth(270.0));
        let listener = Listener::default();
        render(&mut state, &listener);
        let out = render(&mut state, &listener);
        assert!(energy(&out, 0) > energy(&out, 1) * 100.0);
    }

    #[test]
    fn test_angles_survive_a_scalar_in_between() {
        let listener = Listener::default();
        let mut state = PannedState::new(PannerStrategy::Hrtf);
        state.apply(SourceCommand::Elevation(60.0));
        state.apply(SourceCommand::PanningScalar(0.5));
        state.apply(SourceCommand::Azimuth(90.0));

        let mut expected = PannedState::new(PannerStrategy::Hrtf);
        expected.apply(SourceCommand::Azimuth(90.0));
        expected.apply(SourceCommand::Elevation(60.0));

        for _ in 0..2 {
            assert_eq!(render(&mut state, &listener), render(&mut expected, &listener));
        }
        let mut level = PannedState::new(PannerStrategy::Hrtf);
        level.apply(SourceCommand::Azimuth(90.0));
        render(&mut level, &listener);
        assert_ne!(render(&mut state, &listener), render(&mut level, &listener));
    }

    #[test]
    fn test_delegate_follows_context_default() {
        let mut state = PannedState::new(PannerStrategy::Delegate);
        let mut listener = Listener::default();
        render(&mut state, &listener);
        assert_eq!(state.panner.strategy(), PannerStrategy::Stereo);
        listener.default_strategy = PannerStrategy::Hrtf;
        render(&mut state, &listener);
        assert_eq!(state.panner.strategy(), PannerStrategy::Hrtf);
    }
}
