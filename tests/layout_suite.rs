use std::collections::HashSet;

use mindmap_core::{
    Document, FallbackMeasurer, FontDescription, LayoutConfig, LayoutEngine, Node, SceneGraph,
    Spacing, compute_layout,
};

fn ten_px(text: &str, _: &FontDescription) -> f32 {
    text.chars().count() as f32 * 10.0
}

fn layout(doc: &Document, collapsed: &[&str]) -> SceneGraph {
    let collapsed: HashSet<String> = collapsed.iter().map(|id| id.to_string()).collect();
    compute_layout(
        doc,
        &LayoutConfig::default(),
        &FontDescription::default(),
        &ten_px,
        &collapsed,
    )
}

fn nested_document() -> Document {
    Document::new(
        Node::new("root", "R")
            .with_child(Node::new("a", "A").with_child(Node::new("a1", "A1")))
            .with_child(Node::new("b", "B")),
    )
    .unwrap()
}

/// Tree with alternating fan-out and uneven label lengths.
fn generated_document(depth: usize, fan_out: usize) -> Document {
    fn build(prefix: String, depth: usize, fan_out: usize) -> Node {
        let label = format!("Topic {prefix} {}", "x".repeat(prefix.len() % 7));
        let mut node = Node::new(prefix.clone(), label);
        if depth > 0 {
            let count = if depth % 2 == 0 { fan_out } else { fan_out - 1 };
            for i in 0..count {
                node = node.with_child(build(format!("{prefix}.{i}"), depth - 1, fan_out));
            }
        }
        node
    }
    Document::new(build("n".to_string(), depth, fan_out)).unwrap()
}

fn ids(scene: &SceneGraph) -> Vec<&str> {
    scene.nodes.iter().map(|node| node.id.as_str()).collect()
}

fn edges(scene: &SceneGraph) -> Vec<(&str, &str)> {
    scene
        .connectors
        .iter()
        .map(|c| (c.from_id.as_str(), c.to_id.as_str()))
        .collect()
}

#[test]
fn collapsed_subtree_is_hidden() {
    let scene = layout(&nested_document(), &["a"]);
    assert_eq!(ids(&scene), vec!["root", "a", "b"]);
    assert!(edges(&scene).contains(&("root", "a")));
    assert!(!edges(&scene).iter().any(|(_, to)| *to == "a1"));

    let a = scene.node("a").unwrap();
    assert!(a.is_collapsed);
    assert!(a.has_children);
}

#[test]
fn expanded_tree_visits_in_pre_order() {
    let scene = layout(&nested_document(), &[]);
    assert_eq!(ids(&scene), vec!["root", "a", "a1", "b"]);
    let mut connectors = edges(&scene);
    connectors.sort();
    assert_eq!(connectors, vec![("a", "a1"), ("root", "a"), ("root", "b")]);

    let a1 = scene.node("a1").unwrap();
    assert_eq!(a1.depth, 2);
    // Two columns of 80px boxes with 120px gaps.
    assert_eq!(a1.x, 400.0);
    assert_eq!(a1.y, scene.node("a").unwrap().y);
}

#[test]
fn collapsing_a_leaf_changes_nothing_but_its_flag() {
    let doc = nested_document();
    let open = layout(&doc, &[]);
    let closed = layout(&doc, &["b"]);
    assert_eq!(ids(&open), ids(&closed));
    assert_eq!(open.bounds, closed.bounds);
    assert!(closed.node("b").unwrap().is_collapsed);
}

#[test]
fn collapsed_root_shows_only_root() {
    let scene = layout(&nested_document(), &["root"]);
    assert_eq!(ids(&scene), vec!["root"]);
    assert!(scene.connectors.is_empty());
    assert_eq!(scene.bounds.min_x, 0.0);
    assert_eq!(scene.width(), 80.0);
    assert_eq!(scene.height(), 44.0);
}

#[test]
fn bounds_are_tight() {
    let doc = generated_document(4, 3);
    let scene = layout(&doc, &["n.1"]);
    let bounds = scene.bounds;
    for node in &scene.nodes {
        let rect = node.rect();
        assert!(rect.x >= bounds.min_x && rect.y >= bounds.min_y);
        assert!(rect.right() <= bounds.max_x && rect.bottom() <= bounds.max_y);
    }
    let rects: Vec<_> = scene.nodes.iter().map(|node| node.rect()).collect();
    assert!(rects.iter().any(|r| r.x == bounds.min_x));
    assert!(rects.iter().any(|r| r.y == bounds.min_y));
    assert!(rects.iter().any(|r| r.right() == bounds.max_x));
    assert!(rects.iter().any(|r| r.bottom() == bounds.max_y));
}

#[test]
fn collapsed_descendants_never_appear() {
    let doc = generated_document(4, 3);
    let collapsed = ["n.0", "n.2.1"];
    let scene = layout(&doc, &collapsed);
    let hidden: HashSet<String> = collapsed
        .iter()
        .flat_map(|id| doc.descendant_ids(id))
        .collect();
    assert!(!hidden.is_empty());
    for node in &scene.nodes {
        assert!(!hidden.contains(&node.id), "{} should be hidden", node.id);
    }
    for connector in &scene.connectors {
        assert!(!hidden.contains(&connector.from_id));
        assert!(!hidden.contains(&connector.to_id));
    }
    for id in collapsed {
        assert!(scene.node(id).unwrap().is_collapsed);
    }
    assert_eq!(scene.connectors.len(), scene.nodes.len() - 1);
}

#[test]
fn layout_is_deterministic() {
    let doc = generated_document(4, 4);
    let config = LayoutConfig::default();
    let font = FontDescription::default();
    let collapsed: HashSet<String> = ["n.3".to_string()].into_iter().collect();
    let first = compute_layout(&doc, &config, &font, &FallbackMeasurer, &collapsed);
    let second = compute_layout(&doc, &config, &font, &FallbackMeasurer, &collapsed);
    assert_eq!(first, second);
}

#[test]
fn siblings_do_not_overlap_in_a_column() {
    let scene = layout(&generated_document(1, 5), &[]);
    let mut children: Vec<_> = scene.nodes.iter().filter(|n| n.depth == 1).collect();
    children.sort_by(|a, b| a.y.total_cmp(&b.y));
    for pair in children.windows(2) {
        assert_eq!(pair[1].y - pair[0].rect().bottom(), 40.0);
    }
}

#[test]
fn custom_spacing_is_honored() {
    let config = LayoutConfig {
        spacing: Spacing {
            horizontal: 50.0,
            vertical: 10.0,
        },
        ..LayoutConfig::default()
    };
    let doc = nested_document();
    let scene = compute_layout(
        &doc,
        &config,
        &FontDescription::default(),
        &ten_px,
        &HashSet::new(),
    );
    let a = scene.node("a").unwrap();
    let b = scene.node("b").unwrap();
    assert_eq!(a.x, 130.0);
    assert_eq!(b.y - a.rect().bottom(), 10.0);
}

#[test]
fn standalone_measure_matches_layout_boxes() {
    let config = LayoutConfig::default();
    let font = FontDescription::default();
    let engine = LayoutEngine::new(&config, &font, &ten_px);
    let doc = Document::new(Node::new("root", "A fairly long central topic")).unwrap();
    let scene = engine.layout(&doc, &HashSet::new());
    let size = engine.measure("A fairly long central topic");
    let root = scene.node("root").unwrap();
    assert_eq!((root.width, root.height), (size.width, size.height));
    assert_eq!(size.width, 300.0);
}

#[test]
fn connector_paths_follow_node_boxes() {
    let scene = layout(&nested_document(), &[]);
    let paths = scene.connector_paths(0.3);
    assert_eq!(paths.len(), scene.connectors.len());
    for routed in &paths {
        let from = scene.node(&routed.from_id).unwrap().rect();
        let to = scene.node(&routed.to_id).unwrap().rect();
        assert_eq!(routed.path.start.x, from.right());
        assert_eq!(routed.path.start.y, from.center_y());
        assert_eq!(routed.path.end.x, to.x);
        assert_eq!(routed.path.end.y, to.center_y());
        let dx = to.x - from.right();
        assert!((routed.path.control1.x - (from.right() + 0.3 * dx)).abs() < 1e-4);
        assert!((routed.path.control2.x - (to.x - 0.3 * dx)).abs() < 1e-4);
    }

    let flat = scene.connector_paths(0.0);
    assert!(flat.iter().all(|r| r.path.control1 == r.path.start && r.path.control2 == r.path.end));
}
