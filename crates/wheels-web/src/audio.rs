use js_sys::Promise;
use wasm_bindgen::JsValue;
use web_sys as web;
use wheels_core::{AudioBackend, AudioError, ImpulseResponse, NodeId, Param, Waveform};

enum WebNode {
    Destination(web::AudioDestinationNode),
    Gain(web::GainNode),
    Oscillator(web::OscillatorNode),
    BufferSource(web::AudioBufferSourceNode),
    Delay(web::DelayNode),
    Convolver(web::ConvolverNode),
    Filter(web::BiquadFilterNode),
}

impl WebNode {
    fn audio_node(&self) -> &web::AudioNode {
        match self {
            WebNode::Destination(n) => n.as_ref(),
            WebNode::Gain(n) => n.as_ref(),
            WebNode::Oscillator(n) => n.as_ref(),
            WebNode::BufferSource(n) => n.as_ref(),
            WebNode::Delay(n) => n.as_ref(),
            WebNode::Convolver(n) => n.as_ref(),
            WebNode::Filter(n) => n.as_ref(),
        }
    }

    fn param(&self, param: Param) -> Option<web::AudioParam> {
        match (self, param) {
            (WebNode::Gain(n), Param::Gain) => Some(n.gain()),
            (WebNode::Oscillator(n), Param::Frequency) => Some(n.frequency()),
            (WebNode::Filter(n), Param::Frequency) => Some(n.frequency()),
            (WebNode::Delay(n), Param::DelayTime) => Some(n.delay_time()),
            _ => None,
        }
    }

    fn scheduled(&self) -> Option<&web::AudioScheduledSourceNode> {
        match self {
            WebNode::Oscillator(n) => Some(n.as_ref()),
            WebNode::BufferSource(n) => Some(n.as_ref()),
            _ => None,
        }
    }
}

fn js_reason(e: JsValue) -> String {
    format!("{:?}", e)
}

fn created(kind: &'static str) -> impl FnOnce(JsValue) -> AudioError {
    move |e| AudioError::NodeCreation {
        kind,
        reason: js_reason(e),
    }
}

fn rejected(op: &'static str) -> impl FnOnce(JsValue) -> AudioError {
    move |e| AudioError::Backend {
        op,
        reason: js_reason(e),
    }
}

/// [`AudioBackend`] over a browser `AudioContext`.
///
/// Nodes live in a slab indexed by [`NodeId`]; `release` frees the slot and
/// lets the browser collect the node once its schedule has run out. Without a
/// context every factory reports [`AudioError::Unavailable`].
pub struct WebAudioBackend {
    ctx: Option<web::AudioContext>,
    nodes: Vec<Option<WebNode>>,
    free: Vec<u32>,
}

impl WebAudioBackend {
    pub fn new() -> Self {
        match web::AudioContext::new() {
            Ok(ctx) => Self::with_context(ctx),
            Err(e) => {
                log::debug!("[audio] Web Audio is not supported here: {:?}", e);
                Self {
                    ctx: None,
                    nodes: vec![None],
                    free: Vec::new(),
                }
            }
        }
    }

    pub fn with_context(ctx: web::AudioContext) -> Self {
        let destination = WebNode::Destination(ctx.destination());
        Self {
            ctx: Some(ctx),
            nodes: vec![Some(destination)],
            free: Vec::new(),
        }
    }

    pub fn context(&self) -> Option<&web::AudioContext> {
        self.ctx.as_ref()
    }

    pub fn is_suspended(&self) -> bool {
        self.ctx
            .as_ref()
            .is_some_and(|ctx| ctx.state() == web::AudioContextState::Suspended)
    }

    /// Ask the browser to start rendering; only succeeds inside a user gesture.
    pub fn resume(&self) -> Option<Promise> {
        let ctx = self.ctx.as_ref()?;
        if ctx.state() != web::AudioContextState::Suspended {
            return None;
        }
        match ctx.resume() {
            Ok(p) => Some(p),
            Err(e) => {
                log::error!("[audio] failed to resume audio context: {:?}", e);
                None
            }
        }
    }

    fn ctx(&self) -> Result<&web::AudioContext, AudioError> {
        self.ctx
            .as_ref()
            .ok_or_else(|| AudioError::Unavailable("no AudioContext".into()))
    }

    fn insert(&mut self, node: WebNode) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() as u32 - 1)
            }
        }
    }

    fn get(&self, id: NodeId) -> Result<&WebNode, AudioError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(AudioError::UnknownNode(id))
    }

    fn audio_param(&self, id: NodeId, param: Param) -> Result<web::AudioParam, AudioError> {
        self.get(id)?.param(param).ok_or(AudioError::NoSuchParam {
            node: id,
            param: param.name(),
        })
    }

    fn source(&self, id: NodeId) -> Result<&web::AudioScheduledSourceNode, AudioError> {
        self.get(id)?.scheduled().ok_or(AudioError::InvalidState {
            node: id,
            reason: "only sources can be started or stopped",
        })
    }
}

impl AudioBackend for WebAudioBackend {
    type Buffer = web::AudioBuffer;

    fn current_time(&self) -> f64 {
        self.ctx.as_ref().map_or(0.0, |ctx| ctx.current_time())
    }

    fn sample_rate(&self) -> f32 {
        self.ctx.as_ref().map_or(44_100.0, |ctx| ctx.sample_rate())
    }

    fn destination(&self) -> NodeId {
        NodeId(0)
    }

    fn create_gain(&mut self, value: f32) -> Result<NodeId, AudioError> {
        let g = web::GainNode::new(self.ctx()?).map_err(created("gain"))?;
        g.gain().set_value(value);
        Ok(self.insert(WebNode::Gain(g)))
    }

    fn create_oscillator(
        &mut self,
        waveform: Waveform,
        frequency_hz: f32,
    ) -> Result<NodeId, AudioError> {
        let osc = web::OscillatorNode::new(self.ctx()?).map_err(created("oscillator"))?;
        osc.set_type(match waveform {
            Waveform::Sine => web::OscillatorType::Sine,
            Waveform::Square => web::OscillatorType::Square,
            Waveform::Triangle => web::OscillatorType::Triangle,
            Waveform::Saw => web::OscillatorType::Sawtooth,
        });
        osc.frequency().set_value(frequency_hz);
        Ok(self.insert(WebNode::Oscillator(osc)))
    }

    fn create_buffer_source(
        &mut self,
        buffer: &web::AudioBuffer,
        looping: bool,
    ) -> Result<NodeId, AudioError> {
        let src = web::AudioBufferSourceNode::new(self.ctx()?).map_err(created("buffer source"))?;
        src.set_buffer(Some(buffer));
        src.set_loop(looping);
        Ok(self.insert(WebNode::BufferSource(src)))
    }

    fn create_delay(&mut self, max_delay_sec: f64, delay_sec: f32) -> Result<NodeId, AudioError> {
        let delay = self
            .ctx()?
            .create_delay_with_max_delay_time(max_delay_sec)
            .map_err(created("delay"))?;
        delay.delay_time().set_value(delay_sec);
        Ok(self.insert(WebNode::Delay(delay)))
    }

    fn create_convolver(&mut self, impulse: &ImpulseResponse) -> Result<NodeId, AudioError> {
        let ctx = self.ctx()?;
        let len = impulse.len().max(1) as u32;
        let ir = ctx
            .create_buffer(impulse.channels.len() as u32, len, impulse.sample_rate)
            .map_err(created("impulse buffer"))?;
        for (ch, data) in impulse.channels.iter().enumerate() {
            let mut data = data.clone();
            ir.copy_to_channel(&mut data, ch as i32)
                .map_err(created("impulse buffer"))?;
        }
        let convolver = web::ConvolverNode::new(ctx).map_err(created("convolver"))?;
        convolver.set_buffer(Some(&ir));
        Ok(self.insert(WebNode::Convolver(convolver)))
    }

    fn create_allpass(&mut self, frequency_hz: f32) -> Result<NodeId, AudioError> {
        let filter = web::BiquadFilterNode::new(self.ctx()?).map_err(created("allpass"))?;
        filter.set_type(web::BiquadFilterType::Allpass);
        filter.frequency().set_value(frequency_hz);
        Ok(self.insert(WebNode::Filter(filter)))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), AudioError> {
        let target = self.get(to)?.audio_node();
        self.get(from)?
            .audio_node()
            .connect_with_audio_node(target)
            .map(|_| ())
            .map_err(rejected("connect"))
    }

    fn connect_param(&mut self, from: NodeId, to: NodeId, param: Param) -> Result<(), AudioError> {
        let target = self.audio_param(to, param)?;
        self.get(from)?
            .audio_node()
            .connect_with_audio_param(&target)
            .map_err(rejected("connect param"))
    }

    fn set_value(&mut self, node: NodeId, param: Param, value: f32) -> Result<(), AudioError> {
        self.audio_param(node, param)?.set_value(value);
        Ok(())
    }

    fn set_value_at_time(
        &mut self,
        node: NodeId,
        param: Param,
        value: f32,
        time: f64,
    ) -> Result<(), AudioError> {
        self.audio_param(node, param)?
            .set_value_at_time(value, time)
            .map(|_| ())
            .map_err(rejected("setValueAtTime"))
    }

    fn cancel_scheduled_values(
        &mut self,
        node: NodeId,
        param: Param,
        time: f64,
    ) -> Result<(), AudioError> {
        // Hold the value reached so a following ramp starts from there.
        let target = self.audio_param(node, param)?;
        let held = target.value();
        target
            .cancel_scheduled_values(time)
            .map_err(rejected("cancelScheduledValues"))?;
        target
            .set_value_at_time(held, time)
            .map(|_| ())
            .map_err(rejected("setValueAtTime"))
    }

    fn linear_ramp_to_value_at_time(
        &mut self,
        node: NodeId,
        param: Param,
        value: f32,
        time: f64,
    ) -> Result<(), AudioError> {
        self.audio_param(node, param)?
            .linear_ramp_to_value_at_time(value, time)
            .map(|_| ())
            .map_err(rejected("linearRampToValueAtTime"))
    }

    fn param_value(&self, node: NodeId, param: Param) -> Result<f32, AudioError> {
        Ok(self.audio_param(node, param)?.value())
    }

    fn start(&mut self, node: NodeId, when: f64) -> Result<(), AudioError> {
        self.source(node)?
            .start_with_when(when)
            .map_err(rejected("start"))
    }

    fn stop(&mut self, node: NodeId, when: f64) -> Result<(), AudioError> {
        self.source(node)?
            .stop_with_when(when)
            .map_err(rejected("stop"))
    }

    fn release(&mut self, node: NodeId) {
        if node == self.destination() {
            return;
        }
        if let Some(slot) = self.nodes.get_mut(node.0 as usize) {
            if slot.take().is_some() {
                self.free.push(node.0);
            }
        }
    }
}
