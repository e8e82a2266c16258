//! Global effects. Sources reach them through routes; each effect hears the
//! mono sum of everything routed to it and adds stereo output to the mix.

pub mod echo;
pub mod reverb;

use crate::dsp::fade::Fader;
use crate::dsp::filter::Biquad;
use crate::engine::command::EffectCommand;
use crate::{BLOCK_SIZE, OUTPUT_CHANNELS};

pub use echo::{EchoTap, GlobalEcho};
pub use reverb::GlobalFdnReverb;

/// Audio-thread half of an effect.
pub(crate) trait EffectNode: Send {
    /// Process one mono block, adding stereo interleaved output into `out`.
    fn process(&mut self, input: &[f32], out: &mut [f32]);

    fn apply(&mut self, command: EffectCommand);

    /// Clear internal state such as reverb tails and delay lines.
    fn reset(&mut self);
}

pub(crate) struct EffectSlot {
    node: Box<dyn EffectNode>,
    gain: Fader,
    filter_input: Biquad<1>,
    input: Vec<f32>,
    output: Vec<f32>,
}

impl EffectSlot {
    pub(crate) fn new(node: impl EffectNode + 'static) -> Self {
        Self {
            node: Box::new(node),
            gain: Fader::new(1.0),
            filter_input: Biquad::identity(),
            input: vec![0.0; BLOCK_SIZE],
            output: vec![0.0; BLOCK_SIZE * OUTPUT_CHANNELS],
        }
    }

    pub(crate) fn begin_block(&mut self) {
        self.input.fill(0.0);
    }

    pub(crate) fn accumulate(&mut self, send: &[f32]) {
        for (i, s) in self.input.iter_mut().zip(send) {
            *i += s;
        }
    }

    /// Run the effect on this block's input and add the result into `out`.
    pub(crate) fn run(&mut self, out: &mut [f32]) {
        self.output.fill(0.0);
        self.filter_input.process_interleaved(&mut self.input);
        self.node.process(&self.input, &mut self.output);
        self.gain.apply(&mut self.output, OUTPUT_CHANNELS);
        for (o, s) in out.iter_mut().zip(&self.output) {
            *o += s;
        }
    }

    pub(crate) fn apply(&mut self, command: EffectCommand) {
        match command {
            EffectCommand::Gain(gain) => self.gain.set_target(gain as f32, BLOCK_SIZE),
            EffectCommand::FilterInput(config) => self.filter_input.set_def(config.design()),
            EffectCommand::Reset => {
                self.filter_input.reset();
                self.node.reset();
            }
            other => self.node.apply(other),
        }
    }
}
