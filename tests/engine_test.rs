use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use batchwork::documents::{DocumentHandle, DocumentStore};
use batchwork::engine::Engine;
use batchwork::error::Result;
use batchwork::images::{ImageStore, Point, Size};
use batchwork::model::{ActionItem, ConditionItem, OptionItem, PropertyItem};
use batchwork::tree::{ActionTree, NodeId};
use serde_json::json;
use tempfile::TempDir;

type Log = Rc<RefCell<Vec<String>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// `Record` appends the node's normalized text to `log`; `Halt` requests a stop.
fn engine_for(item: &ActionItem, log: &Log) -> Engine {
    let mut engine = Engine::new(ActionTree::from_item(item));
    let record_log = Rc::clone(log);
    engine.register_action("Record", move |engine: &mut Engine, id: NodeId| -> Result<()> {
        let tree = engine.tree();
        let text = tree.normalize_value(id, &tree.text(id))?;
        record_log.borrow_mut().push(text);
        Ok(())
    });
    engine.register_action("Halt", |engine: &mut Engine, id: NodeId| -> Result<()> {
        engine.request_stop(id);
        Ok(())
    });
    engine
}

fn record(text: &str) -> ActionItem {
    let mut item = ActionItem::new("Record");
    item.text = text.to_string();
    item
}

fn flagged(mut item: ActionItem, option: &str) -> ActionItem {
    item.options.push(OptionItem::new(option));
    item
}

fn batch(children: Vec<ActionItem>) -> ActionItem {
    let mut item = ActionItem::new("Batch");
    item.actions = children;
    item
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

#[test_log::test]
fn test_solo_children_run_alone() {
    let log = new_log();
    let item = batch(vec![record("A"), flagged(record("B"), "solo"), flagged(record("C"), "mute")]);
    let mut engine = engine_for(&item, &log);

    let report = engine.run();

    assert!(report.is_success());
    assert_eq!(entries(&log), vec!["B"]);
}

#[test]
fn test_muted_children_are_skipped() {
    let log = new_log();
    let item = batch(vec![record("A"), flagged(record("B"), "mute")]);
    let mut engine = engine_for(&item, &log);

    engine.run();

    assert_eq!(entries(&log), vec!["A"]);
}

#[test]
fn test_solo_only_applies_to_batch_children() {
    let log = new_log();
    let mut branch = ActionItem::new("None");
    branch.actions = vec![record("A"), flagged(record("B"), "solo")];
    let mut when = ActionItem::new("If");
    when.actions = vec![branch];
    let mut engine = engine_for(&batch(vec![when]), &log);

    engine.run();

    assert_eq!(entries(&log), vec!["A", "B"]);
}

#[test_log::test]
fn test_stop_unwinds_every_level() {
    let log = new_log();
    let depth2 = batch(vec![record("x"), ActionItem::new("Halt"), record("never1")]);
    let depth1 = batch(vec![depth2, record("never2")]);
    let item = batch(vec![depth1, record("never3")]);
    let mut engine = engine_for(&item, &log);

    let report = engine.run();

    assert_eq!(entries(&log), vec!["x"]);
    assert!(report.stopped);
    assert_eq!(report.failures, 0);
}

#[test]
fn test_stop_flags_are_cleared_between_runs() {
    let log = new_log();
    let item = batch(vec![record("x"), ActionItem::new("Halt"), record("never")]);
    let mut engine = engine_for(&item, &log);

    engine.run();
    let report = engine.run();

    assert_eq!(entries(&log), vec!["x", "x"]);
    assert!(report.stopped);
}

#[test_log::test]
fn test_for_each_file_sets_current_file() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("b.txt"), "b").unwrap();
    fs::write(dir.join("a.txt"), "a").unwrap();
    fs::write(dir.join("skip.csv"), "c").unwrap();

    let log = new_log();
    let mut for_each = ActionItem::new("ForEachFile");
    for_each.input_filename = "*.txt".to_string();
    for_each.actions = vec![record("{CurrentFilename}")];
    let mut item = batch(vec![for_each]);
    item.working_path = dir.display().to_string();
    let mut engine = engine_for(&item, &log);

    let report = engine.run();

    assert!(report.is_success());
    assert_eq!(entries(&log), vec!["a.txt", "b.txt"]);
    let for_each = engine.tree().children(engine.tree().root())[0];
    assert_eq!(engine.tree().node(for_each).current_file, None);
}

#[test]
fn test_for_each_file_without_inputs_fails() {
    let temp_dir = TempDir::new().unwrap();
    let log = new_log();
    let mut for_each = ActionItem::new("ForEachFile");
    for_each.input_filename = "*.nothing".to_string();
    for_each.actions = vec![record("never")];
    let mut item = batch(vec![for_each, record("after")]);
    item.working_path = temp_dir.path().display().to_string();
    let mut engine = engine_for(&item, &log);

    let report = engine.run();

    assert_eq!(report.failures, 1);
    assert_eq!(entries(&log), vec!["after"]);
}

#[test]
fn test_if_branches_follow_conditions() {
    let log = new_log();

    let mut yes = ActionItem::new("None");
    yes.conditions = vec![ConditionItem::new("kind == 'thumb'")];
    yes.actions = vec![record("yes")];

    let mut no = ActionItem::new("None");
    no.conditions = vec![ConditionItem::new("kind == 'full'")];
    no.actions = vec![record("no")];

    let mut assigned = ActionItem::new("None");
    assigned.conditions = vec![
        ConditionItem { assignment: "n = 2 * 3".to_string(), condition: String::new() },
        ConditionItem::new("n == 6"),
    ];
    assigned.actions = vec![record("assigned")];

    let mut broken = ActionItem::new("None");
    broken.conditions = vec![ConditionItem::new("kind ==")];
    broken.actions = vec![record("broken")];

    let mut when = ActionItem::new("If");
    when.actions = vec![yes, no, assigned, broken];
    let mut engine = engine_for(&batch(vec![when]), &log);
    engine.set_variable("kind", json!("thumb"));

    let report = engine.run();

    assert!(report.is_success());
    assert_eq!(entries(&log), vec!["yes", "assigned"]);
}

#[test]
fn test_if_honors_ancestor_conditions() {
    let log = new_log();
    let mut branch = ActionItem::new("None");
    branch.actions = vec![record("ran")];
    let mut when = ActionItem::new("If");
    when.conditions = vec![ConditionItem::new("enabled")];
    when.actions = vec![branch];
    let item = batch(vec![when]);

    let mut engine = engine_for(&item, &log);
    engine.set_variable("enabled", json!(false));
    engine.run();
    assert!(entries(&log).is_empty());

    engine.set_variable("enabled", json!(true));
    engine.run();
    assert_eq!(entries(&log), vec!["ran"]);
}

#[test]
fn test_current_file_number_in_conditions() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    for name in ["page_1.txt", "page_2.txt", "page_3.txt", "page_4.txt"] {
        fs::write(dir.join(name), name).unwrap();
    }

    let log = new_log();
    let mut even = ActionItem::new("None");
    even.conditions = vec![ConditionItem::new("CurrentFileNumber is even")];
    even.actions = vec![record("{CurrentFilename}")];
    let mut when = ActionItem::new("If");
    when.actions = vec![even];
    let mut for_each = ActionItem::new("ForEachFile");
    for_each.input_filename = "page_*.txt".to_string();
    for_each.actions = vec![when];
    let mut item = batch(vec![for_each]);
    item.working_path = dir.display().to_string();

    let mut engine = engine_for(&item, &log);
    engine.run();

    assert_eq!(entries(&log), vec!["page_2.txt", "page_4.txt"]);
}

#[test_log::test]
fn test_run_sequence_copies_are_isolated() {
    let json = r#"{
        "Action": "Batch",
        "Sequences": [
            {"SequenceName": "thumbs", "Actions": [{"Action": "Record", "Text": "{Label}"}]}
        ],
        "Actions": [
            {"Action": "RunSequence", "SequenceName": "thumbs", "Label": "first"},
            {"Action": "RunSequence", "SequenceName": "thumbs", "Label": "second"}
        ]
    }"#;
    let item: ActionItem = serde_json::from_str(json).unwrap();
    let log = new_log();
    let mut engine = engine_for(&item, &log);

    let report = engine.run();
    assert!(report.is_success());
    assert_eq!(entries(&log), vec!["first", "second"]);

    let root = engine.tree().root();
    let runs = engine.tree().children(root).to_vec();
    let first_copy = engine.tree().children(runs[0])[0];
    let second_copy = engine.tree().children(runs[1])[0];
    assert_ne!(first_copy, second_copy);

    engine.tree_mut().node_mut(first_copy).text = "mutated".to_string();
    assert_eq!(engine.tree().node(second_copy).text, "{Label}");
    let template = engine.tree().find_sequence(root, "thumbs").unwrap();
    assert_eq!(template.actions[0].text, "{Label}");

    engine.run();
    assert_eq!(engine.tree().children(runs[0]).len(), 1);
    let replayed = engine.tree().children(runs[0])[0];
    assert_eq!(engine.tree().node(replayed).text, "{Label}");
    assert_eq!(entries(&log), vec!["first", "second", "first", "second"]);
}

#[test]
fn test_run_sequence_with_unknown_name_fails() {
    let log = new_log();
    let mut run = ActionItem::new("RunSequence");
    run.properties.push(PropertyItem::new("SequenceName", "missing"));
    let mut engine = engine_for(&batch(vec![run, record("after")]), &log);

    let report = engine.run();

    assert_eq!(report.failures, 1);
    assert_eq!(entries(&log), vec!["after"]);
}

#[test]
fn test_batch_loads_config_relative_to_working_path() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(
        dir.join("job.json"),
        r#"{"Action": "Batch", "Text": "merged", "Actions": [{"Action": "Record"}]}"#,
    )
    .unwrap();

    let log = new_log();
    let mut item = ActionItem::new("Batch");
    item.working_path = dir.display().to_string();
    item.config_filename = "job.json".to_string();
    let mut engine = engine_for(&item, &log);

    let report = engine.run();

    assert!(report.is_success());
    assert_eq!(entries(&log), vec!["merged"]);
    assert_eq!(engine.session().last_working_path, Some(dir.to_path_buf()));
}

#[test]
fn test_broken_config_is_counted_and_run_continues() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("broken.json"), "{ not json").unwrap();

    let log = new_log();
    let mut item = batch(vec![record("still runs")]);
    item.working_path = dir.display().to_string();
    item.config_filename = "broken.json".to_string();
    let mut engine = engine_for(&item, &log);

    let report = engine.run();

    assert_eq!(report.failures, 1);
    assert_eq!(entries(&log), vec!["still runs"]);
}

#[test]
fn test_local_output_hook_runs_for_own_output_name() {
    let log = new_log();
    let mut inner = batch(vec![record("inner")]);
    inner.output_name = "inner-report".to_string();
    let plain = batch(vec![record("plain")]);
    let outer = batch(vec![inner, plain]);

    let mut engine = engine_for(&outer, &log);
    let hook_log = Rc::clone(&log);
    engine.on_local_output(move |engine, id| {
        hook_log
            .borrow_mut()
            .push(format!("output:{}", engine.tree().node(id).output_name));
        Ok(())
    });

    engine.run();

    assert_eq!(entries(&log), vec!["inner", "output:inner-report", "plain"]);
}

#[test]
fn test_unrecognized_actions_are_ignored() {
    let log = new_log();
    let item = batch(vec![ActionItem::new("Mystery"), ActionItem::new("none"), record("after")]);
    let mut engine = engine_for(&item, &log);

    let report = engine.run();

    assert!(report.is_success());
    assert_eq!(entries(&log), vec!["after"]);
    assert!(!engine.registry().is_recognized("Mystery"));
    assert!(engine.registry().is_recognized("record"));
}

#[test_log::test]
fn test_custom_failures_are_local() {
    let log = new_log();
    let item = batch(vec![ActionItem::new("Explode"), record("after")]);
    let mut engine = engine_for(&item, &log);
    engine.register_action("Explode", |_: &mut Engine, _: NodeId| -> Result<()> {
        Err(anyhow::anyhow!("boom").into())
    });

    let report = engine.run();

    assert_eq!(report.failures, 1);
    assert!(!report.stopped);
    assert_eq!(entries(&log), vec!["after"]);
}

#[derive(Debug)]
struct RecordingStore {
    log: Log,
    next: i32,
}

impl DocumentStore for RecordingStore {
    fn open(&mut self, path: &Path) -> Result<DocumentHandle> {
        let handle = DocumentHandle { id: self.next, source: path.to_path_buf() };
        self.next += 1;
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        self.log.borrow_mut().push(format!("open {}", name));
        Ok(handle)
    }

    fn save(&mut self, handle: &DocumentHandle, path: &Path) -> Result<()> {
        self.log
            .borrow_mut()
            .push(format!("save {} -> {}", handle.id, path.display()));
        Ok(())
    }
}

#[test]
fn test_working_document_is_shared_with_descendants() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("deck.pptx"), "deck").unwrap();

    let mut save = ActionItem::new("SaveWorkingDocument");
    save.output_filename = "out/deck.pptx".to_string();
    let mut deck = batch(vec![ActionItem::new("OpenWorkingDocument"), save]);
    deck.input_filename = "deck.pptx".to_string();
    let mut item = batch(vec![deck]);
    item.working_path = dir.display().to_string();

    let log = new_log();
    let store = RecordingStore { log: Rc::clone(&log), next: 7 };
    let mut engine = Engine::new(ActionTree::from_item(&item)).with_documents(store);

    let report = engine.run();

    assert!(report.is_success());
    let expected_output: PathBuf = dir.join("out").join("deck.pptx");
    assert_eq!(
        entries(&log),
        vec!["open deck.pptx".to_string(), format!("save 7 -> {}", expected_output.display())]
    );
    let deck = engine.tree().children(engine.tree().root())[0];
    assert_eq!(engine.tree().node(deck).working_document_index, Some(7));
    assert!(dir.join("out").is_dir());
}

#[test]
fn test_save_without_open_document_fails() {
    let temp_dir = TempDir::new().unwrap();
    let mut save = ActionItem::new("SaveWorkingDocument");
    save.output_filename = "deck.pptx".to_string();
    let mut item = batch(vec![save]);
    item.working_path = temp_dir.path().display().to_string();

    let mut engine = Engine::new(ActionTree::from_item(&item));

    assert_eq!(engine.run().failures, 1);
}

#[test]
fn test_image_open_and_save_copies_source() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("logo.png"), "pixels").unwrap();

    let mut open = ActionItem::new("FileOpenImage");
    open.input_filename = "logo.png".to_string();
    let mut save = ActionItem::new("FileSaveImage");
    save.output_filename = "copies/logo-{Suffix}.png".to_string();
    save.properties.push(PropertyItem::new("Suffix", "v2"));
    let mut item = batch(vec![open, save]);
    item.working_path = dir.display().to_string();

    let mut engine = Engine::new(ActionTree::from_item(&item));
    let report = engine.run();

    assert!(report.is_success());
    assert_eq!(fs::read_to_string(dir.join("copies/logo-v2.png")).unwrap(), "pixels");
    assert_eq!(engine.session().images.working().as_deref(), Some("logo"));
}

#[test]
fn test_image_background_needs_a_size() {
    let mut sized = ActionItem::new("ImageBackground");
    sized.properties.push(PropertyItem::new("ImageName", "canvas"));
    sized.properties.push(PropertyItem::new("Width", "640"));
    sized.properties.push(PropertyItem::new("Height", "480"));
    let unsized_bg = ActionItem::new("ImageBackground");

    let mut engine = Engine::new(ActionTree::from_item(&batch(vec![sized, unsized_bg])));
    let report = engine.run();

    assert_eq!(report.failures, 1);
    assert_eq!(engine.session().images.working().as_deref(), Some("canvas"));
}

#[test]
fn test_reset_starts_a_fresh_session() {
    let temp_dir = TempDir::new().unwrap();
    let mut item = batch(vec![ActionItem::new("Explode")]);
    item.working_path = temp_dir.path().display().to_string();

    let log = new_log();
    let mut engine = engine_for(&item, &log);
    engine.register_action("Explode", |_: &mut Engine, _: NodeId| -> Result<()> {
        Err(anyhow::anyhow!("boom").into())
    });
    engine.run();
    assert_eq!(engine.session().failures(), 1);
    assert!(engine.session().last_working_path.is_some());

    engine.reset();

    assert_eq!(engine.session().failures(), 0);
    assert_eq!(engine.session().last_working_path, None);
    assert!(engine.registry().is_recognized("Explode"));
}

fn files_in(dir: &Path, names: &[&str]) {
    for name in names {
        fs::write(dir.join(name), name).unwrap();
    }
}

#[test_log::test]
fn test_rerunning_config_batch_runs_loaded_children_once() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(
        dir.join("job.json"),
        r#"{"Action": "Batch", "Properties": [{"Name": "Tag", "Value": "t"}],
            "Actions": [{"Action": "Record", "Text": "loaded"}]}"#,
    )
    .unwrap();

    let log = new_log();
    let mut item = ActionItem::new("Batch");
    item.working_path = dir.display().to_string();
    item.config_filename = "job.json".to_string();
    let mut engine = engine_for(&item, &log);

    engine.run();
    let size = engine.tree().len();
    engine.run();

    let root = engine.tree().root();
    assert_eq!(entries(&log), vec!["loaded", "loaded"]);
    assert_eq!(engine.tree().children(root).len(), 1);
    assert_eq!(engine.tree().node(root).properties.len(), 1);
    assert_eq!(engine.tree().len(), size);
}

#[test]
fn test_rerunning_attached_config_replaces_the_child() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    fs::write(dir.join("step.json"), r#"{"Action": "Record", "Text": "attached"}"#).unwrap();

    let log = new_log();
    let mut item = batch(vec![record("own")]);
    item.working_path = dir.display().to_string();
    item.config_filename = "step.json".to_string();
    let mut engine = engine_for(&item, &log);

    engine.run();
    engine.run();

    let root = engine.tree().root();
    assert_eq!(entries(&log), vec!["own", "attached", "own", "attached"]);
    assert_eq!(engine.tree().children(root).len(), 2);
}

#[test_log::test]
fn test_config_batch_inside_for_each_file_runs_once_per_file() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    files_in(dir, &["a.png", "b.png", "c.png"]);
    fs::write(
        dir.join("step.json"),
        r#"{"Action": "Batch", "Actions": [{"Action": "Record", "Text": "{CurrentFilename}"}]}"#,
    )
    .unwrap();

    let log = new_log();
    let mut nested = ActionItem::new("Batch");
    nested.config_filename = "step.json".to_string();
    let mut for_each = ActionItem::new("ForEachFile");
    for_each.input_filename = "*.png".to_string();
    for_each.actions = vec![nested];
    let mut item = batch(vec![for_each]);
    item.working_path = dir.display().to_string();
    let mut engine = engine_for(&item, &log);

    let report = engine.run();

    assert!(report.is_success());
    assert_eq!(entries(&log), vec!["a.png", "b.png", "c.png"]);
    let root = engine.tree().root();
    let for_each = engine.tree().children(root)[0];
    let nested = engine.tree().children(for_each)[0];
    assert_eq!(engine.tree().children(nested).len(), 1);
}

#[test_log::test]
fn test_custom_action_can_dispatch_its_own_name() {
    let log = new_log();
    let calls = Rc::new(Cell::new(0));
    let inner = {
        let mut group = ActionItem::new("Group");
        group.actions = vec![record("b")];
        group
    };
    let mut outer = ActionItem::new("Group");
    outer.actions = vec![record("a"), inner, record("c")];
    let mut engine = engine_for(&batch(vec![outer]), &log);
    let counter = Rc::clone(&calls);
    engine.register_action("Group", move |engine: &mut Engine, id: NodeId| -> Result<()> {
        counter.set(counter.get() + 1);
        let children = engine.tree().children(id).to_vec();
        engine.run_actions(&children);
        Ok(())
    });

    let report = engine.run();

    assert!(report.is_success());
    assert_eq!(calls.get(), 2);
    assert_eq!(entries(&log), vec!["a", "b", "c"]);
}

#[test]
fn test_run_sequence_reuses_arena_slots() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    let names: Vec<String> = (1..=20).map(|n| format!("page_{:02}.txt", n)).collect();
    for name in &names {
        fs::write(dir.join(name), name).unwrap();
    }

    let json = r#"{
        "Action": "Batch",
        "Sequences": [
            {"Name": "pair", "Actions": [{"Action": "Record", "Text": "{CurrentFileNumber}"},
                                         {"Action": "None"}]}
        ],
        "Actions": [
            {"Action": "ForEachFile", "InputFilename": "page_*.txt",
             "Actions": [{"Action": "RunSequence", "SequenceName": "pair"}]}
        ]
    }"#;
    let mut item: ActionItem = serde_json::from_str(json).unwrap();
    item.working_path = dir.display().to_string();
    let log = new_log();
    let mut engine = engine_for(&item, &log);
    let before = engine.tree().len();

    engine.run();
    engine.run();

    assert_eq!(entries(&log).len(), 40);
    assert_eq!(entries(&log)[19], "20");
    assert_eq!(engine.tree().len(), before + 2);
    assert_eq!(engine.tree().live_len(), before + 2);
}

#[test_log::test]
fn test_stop_inside_for_each_file_skips_remaining_files() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    files_in(dir, &["a.txt", "b.txt", "c.txt"]);

    let log = new_log();
    let mut for_each = ActionItem::new("ForEachFile");
    for_each.input_filename = "*.txt".to_string();
    for_each.actions = vec![record("{CurrentFilename}"), ActionItem::new("Halt"), record("never")];
    let mut item = batch(vec![for_each, record("never2")]);
    item.working_path = dir.display().to_string();
    let mut engine = engine_for(&item, &log);

    let report = engine.run();

    assert!(report.stopped);
    assert_eq!(entries(&log), vec!["a.txt"]);
}

#[test]
fn test_stop_inside_if_skips_later_branches() {
    let log = new_log();
    let mut first = ActionItem::new("None");
    first.actions = vec![record("x"), ActionItem::new("Halt"), record("never")];
    let mut second = ActionItem::new("None");
    second.actions = vec![record("never2")];
    let mut when = ActionItem::new("If");
    when.actions = vec![first, second];
    let mut engine = engine_for(&batch(vec![when, record("never3")]), &log);

    let report = engine.run();

    assert!(report.stopped);
    assert_eq!(entries(&log), vec!["x"]);
}

#[test]
fn test_stop_inside_run_sequence_unwinds() {
    let json = r#"{
        "Action": "Batch",
        "Sequences": [
            {"Name": "steps", "Actions": [{"Action": "Record", "Text": "s1"},
                                          {"Action": "Halt"},
                                          {"Action": "Record", "Text": "never"}]}
        ],
        "Actions": [
            {"Action": "RunSequence", "SequenceName": "steps"},
            {"Action": "Record", "Text": "never2"}
        ]
    }"#;
    let item: ActionItem = serde_json::from_str(json).unwrap();
    let log = new_log();
    let mut engine = engine_for(&item, &log);

    let report = engine.run();

    assert!(report.stopped);
    assert_eq!(entries(&log), vec!["s1"]);
}

#[test_log::test]
fn test_data_files_are_resolved_for_custom_actions() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    files_in(dir, &["b.csv", "a.csv", "notes.txt"]);
    fs::create_dir(dir.join("src")).unwrap();
    files_in(&dir.join("src"), &["x.json"]);

    let mut by_pattern = ActionItem::new("Data");
    by_pattern.data_filename = "*.csv".to_string();
    let mut by_names = ActionItem::new("Data");
    by_names.source_folder_name = "src".to_string();
    by_names.data_names = vec!["x.json".to_string(), "missing.json".to_string()];
    let mut item = batch(vec![by_pattern, by_names]);
    item.working_path = dir.display().to_string();

    let log = new_log();
    let mut engine = engine_for(&item, &log);
    let data_log = Rc::clone(&log);
    engine.register_action("Data", move |engine: &mut Engine, id: NodeId| -> Result<()> {
        let names: Vec<String> = engine
            .tree()
            .node(id)
            .resolved
            .data_files
            .iter()
            .map(|f| f.strip_prefix(engine.tree().node(id).resolved.working_dir.as_ref().unwrap()))
            .map(|f| f.unwrap().display().to_string())
            .collect();
        data_log.borrow_mut().push(names.join(","));
        Ok(())
    });

    let report = engine.run();

    assert!(report.is_success());
    let expected_src = Path::new("src").join("x.json").display().to_string();
    assert_eq!(entries(&log), vec!["a.csv,b.csv".to_string(), expected_src]);
}

#[derive(Debug, Default)]
struct RecordingImages {
    calls: Vec<String>,
    working: Option<String>,
}

#[derive(Debug, Clone)]
struct SharedImages(Rc<RefCell<RecordingImages>>);

impl ImageStore for SharedImages {
    fn load(&mut self, name: &str, path: &Path) -> Result<()> {
        let mut images = self.0.borrow_mut();
        let file = path.file_name().unwrap().to_string_lossy().into_owned();
        images.calls.push(format!("load {} {}", name, file));
        images.working = Some(name.to_string());
        Ok(())
    }

    fn save(&mut self, name: &str, path: &Path) -> Result<()> {
        self.0.borrow_mut().calls.push(format!("save {} {}", name, path.display()));
        Ok(())
    }

    fn overlay(&mut self, target: &str, path: &Path, at: Point) -> Result<()> {
        let file = path.file_name().unwrap().to_string_lossy().into_owned();
        self.0
            .borrow_mut()
            .calls
            .push(format!("overlay {} {} {},{}", target, file, at.x, at.y));
        Ok(())
    }

    fn draw(&mut self, target: &str, source: &str, at: Point) -> Result<()> {
        self.0
            .borrow_mut()
            .calls
            .push(format!("draw {} {} {},{}", target, source, at.x, at.y));
        Ok(())
    }

    fn background(&mut self, name: &str, color: &str, size: Size) -> Result<()> {
        let mut images = self.0.borrow_mut();
        images
            .calls
            .push(format!("background {} {} {}x{}", name, color, size.width, size.height));
        images.working = Some(name.to_string());
        Ok(())
    }

    fn resize(&mut self, name: &str, size: Size) -> Result<()> {
        self.0
            .borrow_mut()
            .calls
            .push(format!("resize {} {}x{}", name, size.width, size.height));
        Ok(())
    }

    fn set_working(&mut self, name: &str) -> Result<()> {
        let mut images = self.0.borrow_mut();
        images.calls.push(format!("working {}", name));
        images.working = Some(name.to_string());
        Ok(())
    }

    fn working(&self) -> Option<String> {
        self.0.borrow().working.clone()
    }

    fn clear(&mut self) {
        let mut images = self.0.borrow_mut();
        images.calls.push("clear".to_string());
        images.working = None;
    }
}

fn with_props(action: &str, props: &[(&str, &str)]) -> ActionItem {
    let mut item = ActionItem::new(action);
    for (name, value) in props {
        item.properties.push(PropertyItem::new(*name, *value));
    }
    item
}

#[test_log::test]
fn test_image_actions_reach_the_store() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    files_in(dir, &["logo.png", "stamp.png"]);

    let mut open = ActionItem::new("FileOpenImage");
    open.input_filename = "logo.png".to_string();
    let mut overlay = with_props("FileOverlayImage", &[("X", "5"), ("Y", "6")]);
    overlay.input_filename = "stamp.png".to_string();
    let mut item = batch(vec![
        open,
        with_props(
            "ImageBackground",
            &[("ImageName", "canvas"), ("Color", "navy"), ("Width", "100"), ("Height", "50")],
        ),
        overlay,
        with_props("DrawImage", &[("ImageName", "logo"), ("X", "-2"), ("Y", "3")]),
        with_props("SizeImage", &[("Width", "200"), ("Height", "100")]),
        with_props("SetWorkingImage", &[("ImageName", "logo")]),
        ActionItem::new("ImagesClear"),
    ]);
    item.working_path = dir.display().to_string();

    let images = Rc::new(RefCell::new(RecordingImages::default()));
    let mut engine =
        Engine::new(ActionTree::from_item(&item)).with_images(SharedImages(Rc::clone(&images)));

    let report = engine.run();

    assert!(report.is_success());
    assert_eq!(
        images.borrow().calls,
        vec![
            "load logo logo.png",
            "background canvas navy 100x50",
            "overlay canvas stamp.png 5,6",
            "draw canvas logo -2,3",
            "resize canvas 200x100",
            "working logo",
            "clear",
        ]
    );
    assert_eq!(engine.session().images.working(), None);
}

#[test]
fn test_image_actions_without_working_image_fail() {
    let item = batch(vec![
        with_props("DrawImage", &[("ImageName", "logo")]),
        with_props("SizeImage", &[("Width", "10"), ("Height", "10")]),
        ActionItem::new("SetWorkingImage"),
    ]);

    let images = Rc::new(RefCell::new(RecordingImages::default()));
    let mut engine =
        Engine::new(ActionTree::from_item(&item)).with_images(SharedImages(Rc::clone(&images)));

    assert_eq!(engine.run().failures, 3);
    assert!(images.borrow().calls.is_empty());
}
