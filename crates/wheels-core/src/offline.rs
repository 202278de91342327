//! Deterministic in-memory [`AudioBackend`] that records the graph instead of
//! rendering it. The clock only moves when [`OfflineBackend::advance`] is called.

use crate::error::AudioError;
use crate::graph::{AudioBackend, ImpulseResponse, NodeId, Param, Waveform};

/// Decoded sample stand-in: enough to size a source, no sample data.
#[derive(Clone, Debug, PartialEq)]
pub struct PcmBuffer {
    pub sample_rate: f32,
    pub frames: usize,
}

impl PcmBuffer {
    pub fn new(sample_rate: f32, frames: usize) -> Self {
        Self {
            sample_rate,
            frames,
        }
    }

    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Destination,
    Gain,
    Oscillator(Waveform),
    BufferSource { frames: usize, looping: bool },
    Delay { max_delay_sec: f64 },
    Convolver { impulse_len: usize },
    Allpass,
}

impl NodeKind {
    fn label(&self) -> &'static str {
        match self {
            NodeKind::Destination => "destination",
            NodeKind::Gain => "gain",
            NodeKind::Oscillator(_) => "oscillator",
            NodeKind::BufferSource { .. } => "buffer source",
            NodeKind::Delay { .. } => "delay",
            NodeKind::Convolver { .. } => "convolver",
            NodeKind::Allpass => "allpass",
        }
    }

    fn is_source(&self) -> bool {
        matches!(self, NodeKind::Oscillator(_) | NodeKind::BufferSource { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Automation {
    Set { value: f32, time: f64 },
    LinearRamp { value: f32, time: f64 },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Automation::Set { time, .. } | Automation::LinearRamp { time, .. } => time,
        }
    }

    fn value(&self) -> f32 {
        match *self {
            Automation::Set { value, .. } | Automation::LinearRamp { value, .. } => value,
        }
    }
}

#[derive(Clone, Debug)]
struct ParamTrack {
    param: Param,
    initial: f32,
    events: Vec<Automation>,
}

impl ParamTrack {
    fn insert(&mut self, event: Automation) {
        let at = self
            .events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(at, event);
    }

    fn value_at(&self, t: f64) -> f32 {
        let mut value = self.initial;
        let mut since = 0.0_f64;
        for event in &self.events {
            if event.time() <= t {
                value = event.value();
                since = event.time();
                continue;
            }
            if let Automation::LinearRamp { value: target, time } = *event {
                let span = time - since;
                if span > 0.0 {
                    let k = ((t - since) / span) as f32;
                    return value + (target - value) * k;
                }
            }
            return value;
        }
        value
    }
}

/// Everything recorded about one node.
#[derive(Clone, Debug)]
pub struct OfflineNode {
    pub kind: NodeKind,
    pub started_at: Option<f64>,
    pub stop_at: Option<f64>,
    pub stop_calls: usize,
    pub released: bool,
    tracks: Vec<ParamTrack>,
}

impl OfflineNode {
    fn new(kind: NodeKind, initial: &[(Param, f32)]) -> Self {
        let tracks = initial
            .iter()
            .map(|&(param, initial)| ParamTrack {
                param,
                initial,
                events: Vec::new(),
            })
            .collect();
        Self {
            kind,
            started_at: None,
            stop_at: None,
            stop_calls: 0,
            released: false,
            tracks,
        }
    }

    /// Scheduled automation for `param`, in time order.
    pub fn automation(&self, param: Param) -> &[Automation] {
        self.tracks
            .iter()
            .find(|t| t.param == param)
            .map_or(&[], |t| t.events.as_slice())
    }

    /// True once a source has been started and its stop time has not passed.
    pub fn is_playing_at(&self, t: f64) -> bool {
        match (self.started_at, self.stop_at) {
            (Some(start), Some(stop)) => start <= t && t < stop,
            (Some(start), None) => start <= t,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Connection {
    Node(NodeId),
    Param(NodeId, Param),
}

/// Recording backend with a manual clock.
#[derive(Debug)]
pub struct OfflineBackend {
    now: f64,
    sample_rate: f32,
    nodes: Vec<OfflineNode>,
    edges: Vec<(NodeId, Connection)>,
    refuse_nodes: bool,
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new(44_100.0)
    }
}

impl OfflineBackend {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            now: 0.0,
            sample_rate,
            nodes: vec![OfflineNode::new(NodeKind::Destination, &[])],
            edges: Vec::new(),
            refuse_nodes: false,
        }
    }

    /// A backend whose node factories always fail, as when no audio device exists.
    pub fn unavailable() -> Self {
        Self {
            refuse_nodes: true,
            ..Self::new(44_100.0)
        }
    }

    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds.max(0.0);
    }

    pub fn node(&self, id: NodeId) -> Option<&OfflineNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn count_nodes(&self, pred: impl Fn(&NodeKind) -> bool) -> usize {
        self.nodes.iter().filter(|n| pred(&n.kind)).count()
    }

    /// Sources started and not yet past their stop time.
    pub fn playing_sources(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.kind.is_source() && n.is_playing_at(self.now))
            .count()
    }

    pub fn connections_from(&self, from: NodeId) -> impl Iterator<Item = Connection> + '_ {
        self.edges
            .iter()
            .filter(move |(f, _)| *f == from)
            .map(|(_, c)| *c)
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.connections_from(from)
            .any(|c| c == Connection::Node(to))
    }

    /// Follow node-to-node edges from `from`; true if `to` is reachable.
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(n) = stack.pop() {
            if n == to {
                return true;
            }
            let Some(flag) = seen.get_mut(n.0 as usize) else {
                continue;
            };
            if *flag {
                continue;
            }
            *flag = true;
            for c in self.connections_from(n) {
                if let Connection::Node(next) = c {
                    stack.push(next);
                }
            }
        }
        false
    }

    fn add(&mut self, node: OfflineNode) -> Result<NodeId, AudioError> {
        if self.refuse_nodes {
            return Err(AudioError::NodeCreation {
                kind: node.kind.label(),
                reason: "offline backend configured as unavailable".into(),
            });
        }
        self.nodes.push(node);
        Ok(NodeId(self.nodes.len() as u32 - 1))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut OfflineNode, AudioError> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(AudioError::UnknownNode(id))
    }

    fn track_mut(&mut self, id: NodeId, param: Param) -> Result<&mut ParamTrack, AudioError> {
        self.node_mut(id)?
            .tracks
            .iter_mut()
            .find(|t| t.param == param)
            .ok_or(AudioError::NoSuchParam {
                node: id,
                param: param.name(),
            })
    }

    fn check_target(&self, id: NodeId) -> Result<(), AudioError> {
        self.node(id).map(|_| ()).ok_or(AudioError::UnknownNode(id))
    }
}

impl AudioBackend for OfflineBackend {
    type Buffer = PcmBuffer;

    fn current_time(&self) -> f64 {
        self.now
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn destination(&self) -> NodeId {
        NodeId(0)
    }

    fn create_gain(&mut self, value: f32) -> Result<NodeId, AudioError> {
        self.add(OfflineNode::new(NodeKind::Gain, &[(Param::Gain, value)]))
    }

    fn create_oscillator(
        &mut self,
        waveform: Waveform,
        frequency_hz: f32,
    ) -> Result<NodeId, AudioError> {
        self.add(OfflineNode::new(
            NodeKind::Oscillator(waveform),
            &[(Param::Frequency, frequency_hz)],
        ))
    }

    fn create_buffer_source(
        &mut self,
        buffer: &PcmBuffer,
        looping: bool,
    ) -> Result<NodeId, AudioError> {
        self.add(OfflineNode::new(
            NodeKind::BufferSource {
                frames: buffer.frames,
                looping,
            },
            &[],
        ))
    }

    fn create_delay(&mut self, max_delay_sec: f64, delay_sec: f32) -> Result<NodeId, AudioError> {
        self.add(OfflineNode::new(
            NodeKind::Delay { max_delay_sec },
            &[(Param::DelayTime, delay_sec)],
        ))
    }

    fn create_convolver(&mut self, impulse: &ImpulseResponse) -> Result<NodeId, AudioError> {
        self.add(OfflineNode::new(
            NodeKind::Convolver {
                impulse_len: impulse.len(),
            },
            &[],
        ))
    }

    fn create_allpass(&mut self, frequency_hz: f32) -> Result<NodeId, AudioError> {
        self.add(OfflineNode::new(
            NodeKind::Allpass,
            &[(Param::Frequency, frequency_hz)],
        ))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), AudioError> {
        self.check_target(from)?;
        self.check_target(to)?;
        self.edges.push((from, Connection::Node(to)));
        Ok(())
    }

    fn connect_param(&mut self, from: NodeId, to: NodeId, param: Param) -> Result<(), AudioError> {
        self.check_target(from)?;
        self.track_mut(to, param)?;
        self.edges.push((from, Connection::Param(to, param)));
        Ok(())
    }

    fn set_value(&mut self, node: NodeId, param: Param, value: f32) -> Result<(), AudioError> {
        let now = self.now;
        self.set_value_at_time(node, param, value, now)
    }

    fn set_value_at_time(
        &mut self,
        node: NodeId,
        param: Param,
        value: f32,
        time: f64,
    ) -> Result<(), AudioError> {
        self.track_mut(node, param)?
            .insert(Automation::Set { value, time });
        Ok(())
    }

    fn cancel_scheduled_values(
        &mut self,
        node: NodeId,
        param: Param,
        time: f64,
    ) -> Result<(), AudioError> {
        let track = self.track_mut(node, param)?;
        // Hold whatever the parameter had reached so the next ramp starts from there.
        let held = track.value_at(time);
        track.events.retain(|e| e.time() < time);
        track.insert(Automation::Set { value: held, time });
        Ok(())
    }

    fn linear_ramp_to_value_at_time(
        &mut self,
        node: NodeId,
        param: Param,
        value: f32,
        time: f64,
    ) -> Result<(), AudioError> {
        self.track_mut(node, param)?
            .insert(Automation::LinearRamp { value, time });
        Ok(())
    }

    fn param_value(&self, node: NodeId, param: Param) -> Result<f32, AudioError> {
        let n = self.node(node).ok_or(AudioError::UnknownNode(node))?;
        n.tracks
            .iter()
            .find(|t| t.param == param)
            .map(|t| t.value_at(self.now))
            .ok_or(AudioError::NoSuchParam {
                node,
                param: param.name(),
            })
    }

    fn start(&mut self, node: NodeId, when: f64) -> Result<(), AudioError> {
        let n = self.node_mut(node)?;
        if !n.kind.is_source() {
            return Err(AudioError::InvalidState {
                node,
                reason: "only sources can be started",
            });
        }
        if n.started_at.is_some() {
            return Err(AudioError::InvalidState {
                node,
                reason: "source already started",
            });
        }
        n.started_at = Some(when);
        Ok(())
    }

    fn stop(&mut self, node: NodeId, when: f64) -> Result<(), AudioError> {
        let n = self.node_mut(node)?;
        if n.started_at.is_none() {
            return Err(AudioError::InvalidState {
                node,
                reason: "source stopped before start",
            });
        }
        n.stop_at = Some(when);
        n.stop_calls += 1;
        Ok(())
    }

    fn release(&mut self, node: NodeId) {
        if let Some(n) = self.nodes.get_mut(node.0 as usize) {
            n.released = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_ramp_interpolates_from_cancel_point() {
        let mut b = OfflineBackend::default();
        let g = b.create_gain(0.0).unwrap();
        b.cancel_scheduled_values(g, Param::Gain, 0.0).unwrap();
        b.linear_ramp_to_value_at_time(g, Param::Gain, 1.0, 0.1).unwrap();
        b.advance(0.05);
        assert!((b.param_value(g, Param::Gain).unwrap() - 0.5).abs() < 1e-4);
        b.advance(0.1);
        assert_eq!(b.param_value(g, Param::Gain).unwrap(), 1.0);
    }

    #[test]
    fn cancel_drops_future_events_and_holds() {
        let mut b = OfflineBackend::default();
        let g = b.create_gain(0.0).unwrap();
        b.linear_ramp_to_value_at_time(g, Param::Gain, 1.0, 1.0).unwrap();
        b.advance(0.5);
        b.cancel_scheduled_values(g, Param::Gain, 0.5).unwrap();
        b.advance(1.0);
        assert!((b.param_value(g, Param::Gain).unwrap() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn sources_cannot_restart() {
        let mut b = OfflineBackend::default();
        let osc = b.create_oscillator(Waveform::Sine, 440.0).unwrap();
        b.start(osc, 0.0).unwrap();
        assert!(b.start(osc, 0.1).is_err());
    }

    #[test]
    fn unavailable_backend_refuses_nodes() {
        let mut b = OfflineBackend::unavailable();
        assert!(matches!(
            b.create_gain(1.0),
            Err(AudioError::NodeCreation { kind: "gain", .. })
        ));
    }
}
