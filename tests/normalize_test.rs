use batchwork::error::Error;
use batchwork::model::PropertyItem;
use batchwork::tree::{ActionNode, ActionTree};

#[test]
fn test_values_without_tokens_are_unchanged() {
    let tree = ActionTree::default();
    let root = tree.root();

    for value in ["", "plain text", "brace { alone }", "{not a token}"] {
        let once = tree.normalize_value(root, value).unwrap();
        assert_eq!(once, value);
        assert_eq!(tree.normalize_value(root, &once).unwrap(), once);
    }
}

#[test]
fn test_fields_and_properties_are_substituted() {
    let mut tree = ActionTree::new(ActionNode::new("Batch"));
    let root = tree.root();
    tree.node_mut(root).working_path = "/data".to_string();
    tree.node_mut(root).properties.push(PropertyItem::new("Size", "128"));
    let child = tree.add_child(root, ActionNode::new("None"));
    tree.node_mut(child).current_file = Some("/data/in/page_7.tif".into());

    let value = tree
        .normalize_value(child, "{WorkingPath}/thumbs/{CurrentFileStem}_{Size}.png")
        .unwrap();
    assert_eq!(value, "/data/thumbs/page_7_128.png");
}

#[test]
fn test_substitution_repeats_until_settled() {
    let mut tree = ActionTree::default();
    let root = tree.root();
    tree.node_mut(root).properties.push(PropertyItem::new("Out", "{Base}/{Name}"));
    tree.node_mut(root).properties.push(PropertyItem::new("Base", "/out"));
    tree.node_mut(root).properties.push(PropertyItem::new("Name", "{Kind}-final"));
    tree.node_mut(root).properties.push(PropertyItem::new("Kind", "thumb"));

    assert_eq!(tree.normalize_value(root, "{Out}").unwrap(), "/out/thumb-final");
}

#[test]
fn test_unknown_tokens_are_left_in_place() {
    let tree = ActionTree::default();
    let root = tree.root();

    assert_eq!(tree.normalize_value(root, "a{Nope}b").unwrap(), "a{Nope}b");
}

#[test]
fn test_unset_builtin_fields_become_zero_values() {
    let tree = ActionTree::default();
    let root = tree.root();

    assert_eq!(tree.normalize_value(root, "[{Text}][{Count}]").unwrap(), "[][0]");
}

#[test]
fn test_self_reference_is_a_config_error() {
    let mut tree = ActionTree::default();
    let root = tree.root();
    tree.node_mut(root).properties.push(PropertyItem::new("Loop", "x{Loop}"));

    match tree.normalize_value(root, "{Loop}") {
        Err(Error::ConfigError(_)) => (),
        other => panic!("Expected ConfigError, got {:?}", other),
    }
}

#[test]
fn test_property_by_name() {
    let mut tree = ActionTree::default();
    let root = tree.root();
    tree.node_mut(root).text = "hello".to_string();
    tree.node_mut(root).properties.push(PropertyItem::new("Greeting", "{Text} world"));
    let child = tree.add_child(root, ActionNode::new("None"));

    assert_eq!(tree.property_by_name(child, "text", true).unwrap(), "hello");
    assert_eq!(tree.property_by_name(child, "Greeting", true).unwrap(), "hello world");
    assert_eq!(tree.property_by_name(child, "Greeting", false).unwrap(), "{Text} world");
    assert_eq!(tree.property_by_name(child, "Missing", true).unwrap(), "");
}
