//! Minimal workflow model for wiring taps into a pipeline
//!
//! Only what the taps need from the host's graph: node names, their inputs
//! and outputs, and the routes feeding a node. Two planning helpers build on
//! it:
//!
//! - `add_observer` (route-copy mode) appends one `DataInspector` node whose
//!   inputs mirror every bound output of every tappable node
//! - `plan_inspector_channels` (per-node mode) reserves one
//!   `from_<node>_to_DataInspector` channel per tappable node
//!
//! `plan_taps` picks between them from the `[inspector]` configuration.

use spyglass_config::{InspectorConfig, TapMode};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::channel::{ChannelId, ChannelRouter};
use crate::message::TappedMessage;

/// Name of the synthetic observer node
pub const OBSERVER_NODE_NAME: &str = "DataInspector";

/// Nodes whose name contains this are never tapped
const INTERNAL_MARKER: &str = "internal";

/// Fully specified data identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConcreteDataMatcher {
    pub origin: String,
    pub description: String,
    pub sub_specification: u32,
}

impl ConcreteDataMatcher {
    pub fn new(origin: &str, description: &str, sub_specification: u32) -> Self {
        Self {
            origin: origin.to_string(),
            description: description.to_string(),
            sub_specification,
        }
    }
}

/// What an output produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMatcher {
    Concrete(ConcreteDataMatcher),
    /// Any sub-specification of `origin`/`description`
    Wildcard { origin: String, description: String },
}

/// How long produced data lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Lifetime {
    #[default]
    Timeframe,
    Condition,
    Sporadic,
    Transient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    /// Binding name; empty outputs are not routed anywhere
    pub binding: String,
    pub matcher: OutputMatcher,
    pub lifetime: Lifetime,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputSpec {
    pub binding: String,
    pub matcher: ConcreteDataMatcher,
    pub lifetime: Lifetime,
}

/// One resolved route into a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRoute {
    pub matcher: InputSpec,
    /// Channel name, `from_<sender>_to_<receiver>`
    pub source_channel: String,
}

/// A pipeline node as far as taps care
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSpec {
    pub name: String,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Whether a node's traffic may be tapped
#[inline]
pub fn is_tappable(node: &NodeSpec) -> bool {
    !node.name.contains(INTERNAL_MARKER)
}

#[inline]
fn is_bound(output: &OutputSpec) -> bool {
    !output.binding.is_empty()
}

/// Input that receives what `output` produces
///
/// Wildcard outputs are pinned to sub-specification 0.
pub fn as_input_spec(output: &OutputSpec) -> InputSpec {
    let matcher = match &output.matcher {
        OutputMatcher::Concrete(concrete) => concrete.clone(),
        OutputMatcher::Wildcard { origin, description } => ConcreteDataMatcher {
            origin: origin.clone(),
            description: description.clone(),
            sub_specification: 0,
        },
    };

    InputSpec {
        binding: output.binding.clone(),
        matcher,
        lifetime: output.lifetime,
    }
}

/// Append the observer node for route-copy mode
///
/// Returns the number of inputs the observer got.
pub fn add_observer(workflow: &mut Vec<NodeSpec>) -> usize {
    let inputs: Vec<InputSpec> = workflow
        .iter()
        .filter(|node| is_tappable(node) && node.name != OBSERVER_NODE_NAME)
        .flat_map(|node| node.outputs.iter())
        .filter(|output| is_bound(output))
        .map(as_input_spec)
        .collect();

    let count = inputs.len();
    workflow.push(NodeSpec {
        name: OBSERVER_NODE_NAME.to_string(),
        inputs,
        outputs: Vec::new(),
    });
    count
}

/// Name of the node feeding the route that matches `input`
///
/// The sender is the text between the first and second `_` of the route's
/// source channel.
pub fn find_sender_by_route<'a>(routes: &'a [InputRoute], input: &InputSpec) -> Option<&'a str> {
    let route = routes.iter().find(|route| route.matcher == *input)?;
    let (_, rest) = route.source_channel.split_once('_')?;
    Some(rest.split_once('_').map_or(rest, |(sender, _)| sender))
}

/// Channel name reserved for `node`'s duplicated traffic
pub fn inspector_channel_name(node: &str) -> ChannelId {
    ChannelId::new(format!("from_{node}_to_{OBSERVER_NODE_NAME}"))
}

/// Reserve one inspector channel per tappable node (per-node mode)
pub fn plan_inspector_channels(workflow: &[NodeSpec]) -> Vec<(String, ChannelId)> {
    workflow
        .iter()
        .filter(|node| is_tappable(node) && node.name != OBSERVER_NODE_NAME)
        .map(|node| (node.name.clone(), inspector_channel_name(&node.name)))
        .collect()
}

/// One reserved per-node channel and the receiving end of it
#[derive(Debug)]
pub struct PlannedChannel {
    pub node: String,
    pub channel: ChannelId,
    pub receiver: mpsc::Receiver<TappedMessage>,
}

/// Taps set up for a workflow
#[derive(Debug)]
pub enum TapPlan {
    /// Inspection is off, the workflow is untouched
    Disabled,
    /// Every tappable node got its own inspector channel, all held by `router`
    PerNode {
        router: ChannelRouter,
        channels: Vec<PlannedChannel>,
    },
    /// An observer node was appended to the workflow
    RouteCopy { observer_inputs: usize },
}

impl TapPlan {
    /// Mode the plan was built for, `None` when disabled
    pub fn mode(&self) -> Option<TapMode> {
        match self {
            Self::Disabled => None,
            Self::PerNode { .. } => Some(TapMode::PerNode),
            Self::RouteCopy { .. } => Some(TapMode::RouteCopy),
        }
    }

    /// Channel reserved for `node` (per-node mode only)
    pub fn inspector_channel(&self, node: &str) -> Option<&ChannelId> {
        match self {
            Self::PerNode { channels, .. } => channels
                .iter()
                .find(|planned| planned.node == node)
                .map(|planned| &planned.channel),
            _ => None,
        }
    }
}

/// Wire taps into `workflow` the way `config` asks for
///
/// Per-node channels are opened with `channel_capacity`.
pub fn plan_taps(workflow: &mut Vec<NodeSpec>, config: &InspectorConfig) -> TapPlan {
    if !config.enabled {
        debug!("inspection disabled, no taps planned");
        return TapPlan::Disabled;
    }

    match config.mode {
        TapMode::RouteCopy => {
            let observer_inputs = add_observer(workflow);
            info!(mode = config.mode.as_str(), observer_inputs, "taps planned");
            TapPlan::RouteCopy { observer_inputs }
        }
        TapMode::PerNode => {
            let mut router = ChannelRouter::new();
            let channels: Vec<PlannedChannel> = plan_inspector_channels(workflow)
                .into_iter()
                .map(|(node, channel)| {
                    let receiver = router.open(channel.clone(), config.channel_capacity);
                    PlannedChannel {
                        node,
                        channel,
                        receiver,
                    }
                })
                .collect();
            info!(mode = config.mode.as_str(), channels = channels.len(), "taps planned");
            TapPlan::PerNode { router, channels }
        }
    }
}

#[cfg(test)]
#[path = "workflow_test.rs"]
mod tests;
