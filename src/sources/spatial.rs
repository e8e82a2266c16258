use std::sync::Arc;

use super::{impl_source_common, refresh_panner, SourceProps, SourceSlot};
use crate::context::Context;
use crate::dsp::fade::Fader;
use crate::dsp::panner::Panner;
use crate::dsp::spatial::{
    placement, validate_orientation, DistanceParams, Vec3, DEFAULT_ORIENTATION,
};
use crate::dsp::PannerStrategy;
use crate::engine::command::{Command, SourceCommand};
use crate::engine::Listener;
use crate::error::{Error, Result};
use crate::handle::{impl_object, HandleInner, Source};
use crate::library::ensure_initialized;
use crate::{BLOCK_SIZE, OUTPUT_CHANNELS};

pub(crate) struct SpatialState {
    strategy: PannerStrategy,
    panner: Panner,
    position: Vec3,
    distance: DistanceParams,
    gain: Fader,
}

impl SpatialState {
    pub(crate) fn new(strategy: PannerStrategy, distance: DistanceParams) -> Self {
        Self {
            strategy,
            panner: Panner::new(strategy),
            position: [0.0; 3],
            distance,
            gain: Fader::new(1.0),
        }
    }

    pub(crate) fn run(&mut self, input: &[f32], out: &mut [f32], listener: &Listener) {
        refresh_panner(&mut self.panner, self.strategy, listener.default_strategy);
        let place = placement(listener.position, listener.orientation, self.position);
        self.panner.set_angles(place.azimuth, place.elevation);
        self.gain
            .set_target(self.distance.gain_at(place.distance) as f32, BLOCK_SIZE);
        self.panner.run(input, out);
        self.gain.apply(out, OUTPUT_CHANNELS);
    }

    pub(crate) fn apply(&mut self, command: SourceCommand) {
        match command {
            SourceCommand::PannerStrategy(strategy) => self.strategy = strategy,
            SourceCommand::Position(position) => self.position = position,
            SourceCommand::Distance(params) => self.distance = params,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Source3DProps {
    common: SourceProps,
    strategy: PannerStrategy,
    position: Vec3,
    orientation: [f64; 6],
    distance: DistanceParams,
}

/// A source placed in 3D space around the listener.
///
/// Its azimuth and elevation come from where it sits relative to the
/// context's listener, and its loudness from the distance model.
#[derive(Clone)]
pub struct Source3D {
    inner: Arc<HandleInner<Source3DProps>>,
}

impl_object!(Source3D, Source);
impl_source_common!(Source3D);

impl Source3D {
    pub fn new(context: &Context) -> Result<Self> {
        Self::with_strategy(context, PannerStrategy::Delegate)
    }

    pub fn with_strategy(context: &Context, strategy: PannerStrategy) -> Result<Self> {
        ensure_initialized()?;
        let id = context.allocate_id();
        let distance = context.default_distance_params();
        let inner = HandleInner::register(
            context,
            id,
            Source3DProps {
                common: SourceProps::default(),
                strategy,
                position: [0.0; 3],
                orientation: DEFAULT_ORIENTATION,
                distance,
            },
            Command::InsertSource {
                id,
                slot: Box::new(SourceSlot::spatial(SpatialState::new(strategy, distance))),
            },
        );
        tracing::debug!(%id, ?strategy, "3d source created");
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

    pub fn position(&self) -> Vec3 {
        self.inner.props().position
    }

    pub fn set_position(&self, position: Vec3) -> Result<()> {
        if position.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidProperty {
                property: "position",
                reason: "components must be finite",
            });
        }
        self.inner.props().position = position;
        self.send(SourceCommand::Position(position));
        Ok(())
    }

    /// Which way the source faces, `[at, up]`. Kept for the application;
    /// panning depends only on position.
    pub fn orientation(&self) -> [f64; 6] {
        self.inner.props().orientation
    }

    pub fn set_orientation(&self, orientation: [f64; 6]) -> Result<()> {
        validate_orientation(orientation)?;
        self.inner.props().orientation = orientation;
        self.send(SourceCommand::Orientation(orientation));
        Ok(())
    }

    pub fn distance_params(&self) -> DistanceParams {
        self.inner.props().distance
    }

    pub fn set_distance_params(&self, params: DistanceParams) -> Result<()> {
        params.validate()?;
        self.inner.props().distance = params;
        self.send(SourceCommand::Distance(params));
        Ok(())
    }
}
