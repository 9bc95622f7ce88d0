//! Tests for the workflow planning helpers

use spyglass_config::{InspectorConfig, TapMode};

use super::*;

fn concrete_output(binding: &str, origin: &str, description: &str, sub: u32) -> OutputSpec {
    OutputSpec {
        binding: binding.into(),
        matcher: OutputMatcher::Concrete(ConcreteDataMatcher::new(origin, description, sub)),
        lifetime: Lifetime::Timeframe,
    }
}

fn wildcard_output(binding: &str, origin: &str, description: &str) -> OutputSpec {
    OutputSpec {
        binding: binding.into(),
        matcher: OutputMatcher::Wildcard {
            origin: origin.into(),
            description: description.into(),
        },
        lifetime: Lifetime::Condition,
    }
}

fn sample_workflow() -> Vec<NodeSpec> {
    vec![
        NodeSpec {
            name: "producer".into(),
            inputs: vec![],
            outputs: vec![
                concrete_output("clusters", "TPC", "CLUSTERS", 2),
                wildcard_output("digits", "ITS", "DIGITS"),
                concrete_output("", "TPC", "UNBOUND", 0),
            ],
        },
        NodeSpec {
            name: "internal-dpl-clock".into(),
            inputs: vec![],
            outputs: vec![concrete_output("timer", "DPL", "TIMER", 0)],
        },
        NodeSpec::new("sink"),
    ]
}

// ============================================================================
// Tappability and conversion
// ============================================================================

#[test]
fn test_internal_nodes_are_not_tappable() {
    assert!(is_tappable(&NodeSpec::new("producer")));
    assert!(!is_tappable(&NodeSpec::new("internal-dpl-clock")));
    assert!(!is_tappable(&NodeSpec::new("my-internal-proxy")));
}

#[test]
fn test_concrete_output_as_input() {
    let input = as_input_spec(&concrete_output("clusters", "TPC", "CLUSTERS", 2));
    assert_eq!(input.binding, "clusters");
    assert_eq!(input.matcher, ConcreteDataMatcher::new("TPC", "CLUSTERS", 2));
    assert_eq!(input.lifetime, Lifetime::Timeframe);
}

#[test]
fn test_wildcard_output_pinned_to_subspec_zero() {
    let input = as_input_spec(&wildcard_output("digits", "ITS", "DIGITS"));
    assert_eq!(input.matcher, ConcreteDataMatcher::new("ITS", "DIGITS", 0));
    assert_eq!(input.lifetime, Lifetime::Condition);
}

// ============================================================================
// Route-copy planning
// ============================================================================

#[test]
fn test_add_observer_mirrors_bound_outputs() {
    let mut workflow = sample_workflow();
    let added = add_observer(&mut workflow);

    assert_eq!(added, 2);
    assert_eq!(workflow.len(), 4);

    let observer = workflow.last().unwrap();
    assert_eq!(observer.name, OBSERVER_NODE_NAME);
    assert!(observer.outputs.is_empty());

    let bindings: Vec<&str> = observer.inputs.iter().map(|i| i.binding.as_str()).collect();
    assert_eq!(bindings, vec!["clusters", "digits"]);
}

#[test]
fn test_add_observer_to_empty_workflow() {
    let mut workflow = Vec::new();
    assert_eq!(add_observer(&mut workflow), 0);
    assert_eq!(workflow.len(), 1);
    assert!(workflow[0].inputs.is_empty());
}

#[test]
fn test_find_sender_by_route() {
    let input = as_input_spec(&concrete_output("clusters", "TPC", "CLUSTERS", 2));
    let other = as_input_spec(&concrete_output("tracks", "TPC", "TRACKS", 0));
    let routes = vec![
        InputRoute {
            matcher: other.clone(),
            source_channel: "from_tracker_to_DataInspector".into(),
        },
        InputRoute {
            matcher: input.clone(),
            source_channel: "from_producer_to_DataInspector".into(),
        },
    ];

    assert_eq!(find_sender_by_route(&routes, &input), Some("producer"));
    assert_eq!(find_sender_by_route(&routes, &other), Some("tracker"));
}

#[test]
fn test_find_sender_without_match() {
    let input = as_input_spec(&concrete_output("clusters", "TPC", "CLUSTERS", 2));
    assert_eq!(find_sender_by_route(&[], &input), None);

    let routes = vec![InputRoute {
        matcher: input.clone(),
        source_channel: "nounderscores".into(),
    }];
    assert_eq!(find_sender_by_route(&routes, &input), None);
}

// ============================================================================
// Per-node planning
// ============================================================================

#[test]
fn test_plan_inspector_channels() {
    let plan = plan_inspector_channels(&sample_workflow());

    assert_eq!(
        plan,
        vec![
            ("producer".to_string(), ChannelId::new("from_producer_to_DataInspector")),
            ("sink".to_string(), ChannelId::new("from_sink_to_DataInspector")),
        ]
    );
}

#[test]
fn test_plan_skips_observer() {
    let mut workflow = sample_workflow();
    add_observer(&mut workflow);

    let plan = plan_inspector_channels(&workflow);
    assert!(plan.iter().all(|(node, _)| node != OBSERVER_NODE_NAME));
}

// ============================================================================
// Mode selection
// ============================================================================

fn tap_config(mode: TapMode) -> InspectorConfig {
    InspectorConfig {
        enabled: true,
        mode,
        channel_capacity: 2,
        ..Default::default()
    }
}

#[test]
fn test_plan_taps_per_node() {
    let mut workflow = sample_workflow();
    let plan = plan_taps(&mut workflow, &tap_config(TapMode::PerNode));

    assert_eq!(plan.mode(), Some(TapMode::PerNode));
    assert_eq!(workflow.len(), 3, "per-node mode adds no observer node");
    assert_eq!(
        plan.inspector_channel("producer"),
        Some(&ChannelId::new("from_producer_to_DataInspector"))
    );
    assert_eq!(plan.inspector_channel("internal-dpl-clock"), None);

    let TapPlan::PerNode { router, channels } = plan else {
        panic!("expected per-node plan");
    };
    assert_eq!(channels.len(), 2);
    assert_eq!(router.len(), 2);
    for planned in &channels {
        assert!(router.contains(&planned.channel));
        assert_eq!(planned.receiver.max_capacity(), 2);
    }
}

#[test]
fn test_plan_taps_route_copy() {
    let mut workflow = sample_workflow();
    let plan = plan_taps(&mut workflow, &tap_config(TapMode::RouteCopy));

    assert_eq!(plan.mode(), Some(TapMode::RouteCopy));
    assert!(matches!(plan, TapPlan::RouteCopy { observer_inputs: 2 }));
    assert_eq!(workflow.last().map(|n| n.name.as_str()), Some(OBSERVER_NODE_NAME));
    assert_eq!(plan.inspector_channel("producer"), None);
}

#[test]
fn test_plan_taps_disabled() {
    let mut workflow = sample_workflow();
    let config = InspectorConfig {
        enabled: false,
        mode: TapMode::RouteCopy,
        ..Default::default()
    };

    let plan = plan_taps(&mut workflow, &config);
    assert_eq!(plan.mode(), None);
    assert_eq!(workflow.len(), 3);
}
