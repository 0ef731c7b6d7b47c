//! End-to-end extraction of source, assembly and compilation units.

use normalize_trap::entities::{Assembly, Method};
use normalize_trap::model::{SourceSpan, Symbol, SymbolKind, SymbolLocation, SyntaxTree};
use normalize_trap::{
    CollectingSink, Compression, Context, ExtractionConfig, ExtractionScope, Extractor,
    OutputConfig, SemanticModel, Severity, SymbolId, TrapLayout, TrapWriter, TreeId, UnitSpec,
    UnitStatus, extract_all, extract_unit,
};
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use tempfile::TempDir;

fn load_fixture(name: &str) -> SemanticModel {
    let path = format!("{}/tests/fixtures/{}.json", env!("CARGO_MANIFEST_DIR"), name);
    SemanticModel::load(path.as_ref()).unwrap_or_else(|e| panic!("fixture {}: {}", name, e))
}

fn new_extractor(config: ExtractionConfig) -> (Extractor, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    (Extractor::new(config, Arc::clone(&sink)), sink)
}

fn error_texts(sink: &CollectingSink) -> Vec<String> {
    sink.messages()
        .into_iter()
        .filter(|m| m.severity == Severity::Error)
        .map(|m| m.text)
        .collect()
}

fn extract_text(extractor: &Extractor, model: &SemanticModel, unit: UnitSpec) -> (UnitStatus, String) {
    let result = extract_unit(extractor, model, &unit, TrapWriter::memory()).unwrap();
    let text = result.output.text().unwrap().to_string();
    (result.status, text)
}

fn labels_in(text: &str) -> Vec<String> {
    let mut labels = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' {
            let end = bytes[i + 1..]
                .iter()
                .position(|b| !b.is_ascii_digit())
                .map_or(bytes.len(), |p| i + 1 + p);
            if end > i + 1 {
                labels.push(text[i..end].to_string());
            }
            i = end.max(i + 1);
        } else {
            i += 1;
        }
    }
    labels
}

/// Every label is defined once and before use, every key is defined once, and
/// guards are balanced.
fn check_well_formed(text: &str) {
    let mut defined = HashSet::new();
    let mut keys = HashSet::new();
    let mut depth = 0;
    for line in text.lines() {
        if line == ".pop" {
            assert!(depth > 0, "unbalanced .pop");
            depth -= 1;
            continue;
        }
        let (head, body) = match line.split_once('=') {
            Some((head, body)) if head.starts_with('#') => (Some(head), body),
            _ => (None, line),
        };
        for label in labels_in(body) {
            assert!(defined.contains(&label), "{} used before definition: {}", label, line);
        }
        if let Some(head) = head {
            assert!(defined.insert(head.to_string()), "{} defined twice", head);
            if body != "*" {
                assert!(keys.insert(body.to_string()), "key {} defined twice", body);
            }
        }
        if line.starts_with(".push ") {
            depth += 1;
        }
    }
    assert_eq!(depth, 0, "unclosed .push");
}

/// Label defined for the key containing `fragment`.
fn label_for(text: &str, fragment: &str) -> String {
    text.lines()
        .find_map(|line| {
            let (head, key) = line.split_once('=')?;
            (head.starts_with('#') && key.starts_with("@\"") && key.contains(fragment))
                .then(|| head.to_string())
        })
        .unwrap_or_else(|| panic!("no key containing {}", fragment))
}

fn count(text: &str, line: &str) -> usize {
    text.lines().filter(|l| *l == line).count()
}

// === Source units ===

#[test]
fn test_source_unit_describes_declared_types() {
    let model = load_fixture("model");
    let (extractor, sink) = new_extractor(ExtractionConfig::default());
    let (status, text) = extract_text(&extractor, &model, UnitSpec::Source(TreeId(0)));

    assert_eq!(status, UnitStatus::Extracted);
    assert!(error_texts(&sink).is_empty(), "{:?}", error_texts(&sink));
    check_well_formed(&text);

    let file = label_for(&text, "src/Widget.cs;sourcefile");
    assert_eq!(count(&text, &format!("numlines({},12)", file)), 1);

    let global = label_for(&text, "@\";namespace");
    let app = label_for(&text, ".App;namespace");
    assert_eq!(count(&text, &format!("parent_namespace({},{})", app, global)), 1);

    let widget = label_for(&text, ".Widget;type");
    let widget_loc = label_for(&text, ",3,1,10,2;sourcelocation");
    assert_eq!(count(&text, &format!("types({},1,\"Widget\")", widget)), 1);
    assert_eq!(count(&text, &format!("parent_namespace({},{})", widget, app)), 1);
    assert_eq!(count(&text, &format!("type_location({},{})", widget, widget_loc)), 1);
    assert_eq!(count(&text, &format!(".push @\"{{{}}}{{{}}}\"", widget, widget_loc)), 1);

    let helper = label_for(&text, ".Helper;type");
    assert_eq!(count(&text, &format!("nested_types({},{})", helper, widget)), 1);
}

#[test]
fn test_source_unit_references_external_types() {
    let model = load_fixture("model");
    let (extractor, _sink) = new_extractor(ExtractionConfig::default());
    let (_, text) = extract_text(&extractor, &model, UnitSpec::Source(TreeId(0)));

    let int32 = label_for(&text, ".Int32;type");
    assert_eq!(count(&text, &format!("types({},2,\"Int32\")", int32)), 1);
    assert!(!text.lines().any(|l| l.starts_with(&format!("type_location({},", int32))));

    let pointer = label_for(&text, "*;type");
    assert_eq!(count(&text, &format!("types({},6,\"System.Int32*\")", pointer)), 1);
    assert_eq!(count(&text, &format!("pointer_referent_type({},{})", pointer, int32)), 1);

    let widget = label_for(&text, ".Widget;type");
    let list = label_for(&text, ".List;type");
    let list_of_widget = label_for(&text, ">;type");
    assert_eq!(count(&text, &format!("constructed_from({},{})", list_of_widget, list)), 1);
    assert_eq!(count(&text, &format!("type_arguments({},0,{})", widget, list_of_widget)), 1);

    assert_eq!(extractor.missing_types(), vec!["App.Missing".to_string()]);
}

#[test]
fn test_source_unit_methods() {
    let model = load_fixture("model");
    let (extractor, _sink) = new_extractor(ExtractionConfig::default());
    let (_, text) = extract_text(&extractor, &model, UnitSpec::Source(TreeId(0)));

    let widget = label_for(&text, ".Widget;type");
    let resize = label_for(&text, ".Resize(");
    let list_of_widget = label_for(&text, ">;type");
    let location = label_for(&text, ",4,5,6,6;sourcelocation");

    assert_eq!(count(&text, &format!("methods({},\"Resize\",{})", resize, widget)), 1);
    assert_eq!(count(&text, &format!("returns({},{})", resize, list_of_widget)), 1);
    assert_eq!(count(&text, &format!("method_location({},{})", resize, location)), 1);

    let params: Vec<&str> = text
        .lines()
        .filter(|l| l.starts_with("params(") && l.ends_with(&format!(",{})", resize)))
        .collect();
    assert_eq!(params.len(), 2);
    assert!(params[0].contains("\"factor\""));
    assert!(params[1].contains("\"raw\""));

    let load = label_for(&text, ".Load()");
    assert_eq!(count(&text, &format!("methods({},\"Load\",{})", load, widget)), 1);
}

#[test]
fn test_deep_generic_nesting_aborts_unit() {
    let mut model = SemanticModel::default();
    let tree = model.add_tree(SyntaxTree {
        path: "deep.cs".to_string(),
        lines: 1,
        members: vec![SymbolId(1)],
    });
    let definition = model.add_symbol(Symbol::new("Box", SymbolKind::Class));
    for i in 1..=200u32 {
        let mut boxed = Symbol::new("Box", SymbolKind::Class);
        boxed.original_definition = Some(definition);
        boxed.type_arguments = vec![SymbolId(i + 1)];
        model.add_symbol(boxed);
    }
    model.add_symbol(Symbol::new("Leaf", SymbolKind::Class));

    let (extractor, sink) = new_extractor(ExtractionConfig::default());
    let result = extract_unit(&extractor, &model, &UnitSpec::Source(tree), TrapWriter::memory())
        .unwrap();

    assert!(matches!(result.status, UnitStatus::Aborted { .. }));
    assert_eq!(error_texts(&sink), vec!["Aborted extraction of deep.cs".to_string()]);
    let text = result.output.text().unwrap();
    assert_eq!(
        text.lines().filter(|l| l.starts_with(".push")).count(),
        text.lines().filter(|l| *l == ".pop").count()
    );
}

fn accessor_model(owner: bool) -> SemanticModel {
    let mut model = SemanticModel::default();
    let tree = model.add_tree(SyntaxTree {
        path: "c.cs".to_string(),
        lines: 5,
        members: vec![SymbolId(0)],
    });
    let location = SymbolLocation {
        tree,
        span: SourceSpan {
            start_line: 1,
            start_column: 1,
            end_line: 5,
            end_column: 2,
        },
    };
    let mut class = Symbol::new("C", SymbolKind::Class);
    class.locations = vec![location];
    class.members = vec![SymbolId(1)];
    model.add_symbol(class);

    let mut getter = Symbol::new("get_X", SymbolKind::Accessor);
    getter.containing_type = Some(SymbolId(0));
    getter.locations = vec![location];
    if owner {
        getter.associated_symbol = Some(SymbolId(2));
    }
    model.add_symbol(getter);

    let mut property = Symbol::new("X", SymbolKind::Method);
    property.containing_type = Some(SymbolId(0));
    model.add_symbol(property);
    model
}

#[test]
fn test_accessor_records_owner() {
    let model = accessor_model(true);
    let (extractor, sink) = new_extractor(ExtractionConfig::default());
    let (_, text) = extract_text(&extractor, &model, UnitSpec::Source(TreeId(0)));

    let getter = label_for(&text, ".get_X(");
    assert_eq!(count(&text, &format!("accessors({},\"C.X\")", getter)), 1);
    assert!(error_texts(&sink).is_empty());
}

#[test]
fn test_accessor_without_owner_is_model_error() {
    let model = accessor_model(false);
    let (extractor, sink) = new_extractor(ExtractionConfig::default());
    let (status, text) = extract_text(&extractor, &model, UnitSpec::Source(TreeId(0)));

    assert_eq!(status, UnitStatus::Extracted);
    check_well_formed(&text);
    let messages: Vec<_> = sink
        .messages()
        .into_iter()
        .filter(|m| m.severity == Severity::Error)
        .collect();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "Unhandled accessor associated symbol");
    assert_eq!(messages[0].symbol.as_deref(), Some("C.get_X"));
    assert_eq!(messages[0].locations, vec!["c.cs:1:1".to_string()]);

    let (extractor, sink) = new_extractor(ExtractionConfig {
        standalone: true,
        ..Default::default()
    });
    extract_text(&extractor, &model, UnitSpec::Source(TreeId(0)));
    assert!(error_texts(&sink).is_empty());
}

// === Assembly units ===

#[test]
fn test_assembly_unit_has_no_guards() {
    let model = load_fixture("model");
    let (extractor, sink) = new_extractor(ExtractionConfig::default());
    let (status, text) = extract_text(&extractor, &model, UnitSpec::Assembly("App".to_string()));

    assert_eq!(status, UnitStatus::Extracted);
    assert!(error_texts(&sink).is_empty());
    check_well_formed(&text);
    assert!(!text.lines().any(|l| l.starts_with(".push") || l == ".pop"));

    let file = label_for(&text, "/bin/App.dll;sourcefile");
    let assembly = label_for(&text, "App#file:///bin/App.dll;assembly");
    assert_eq!(count(&text, &format!("assemblies({},{},\"App\")", assembly, file)), 1);

    let widget = label_for(&text, ".Widget;type");
    assert!(text.lines().any(|l| l.starts_with(&format!("type_location({},", widget))));
}

#[test]
fn test_assembly_method_reached_twice_is_described_once() {
    let model = load_fixture("model");
    let (extractor, _sink) = new_extractor(ExtractionConfig::default());
    let scope = ExtractionScope::assembly("App", "/bin/App.dll");
    let mut cx = Context::new(&extractor, &model, scope, TrapWriter::memory());

    Assembly::create(&mut cx, "App").unwrap();
    let again = Method::create(&mut cx, SymbolId(4)).unwrap();
    cx.populate_all().unwrap();
    let text = cx.finish().unwrap().text().unwrap().to_string();

    assert_eq!(label_for(&text, ".Resize("), again.label().to_string());
    assert_eq!(text.lines().filter(|l| l.starts_with("methods(")).filter(|l| l.contains("\"Resize\"")).count(), 1);
    assert_eq!(text.lines().filter(|l| l.starts_with(".push")).count(), 0);
}

#[test]
fn test_registered_assembly_file_wins() {
    let model = load_fixture("model");
    let (extractor, _sink) = new_extractor(ExtractionConfig::default());
    extractor.set_assembly_file("App", "/out/App.dll");
    let (_, text) = extract_text(&extractor, &model, UnitSpec::Assembly("App".to_string()));
    label_for(&text, "App#file:///out/App.dll;assembly");
}

#[test]
fn test_nested_type_reached_before_its_container() {
    // A.M takes a B.Inner, and A is extracted before B. Creating Inner creates
    // B, whose inline population creates Inner first.
    let model = SemanticModel::from_json(
        r#"{
            "assemblies": [{ "name": "Lib", "path": "/bin/Lib.dll" }],
            "symbols": [
                { "name": "A", "kind": "class", "containing_assembly": "Lib", "members": [1] },
                { "name": "M", "kind": "method", "containing_type": 0, "containing_assembly": "Lib",
                  "parameters": [{ "name": "x", "type": 3 }] },
                { "name": "B", "kind": "class", "containing_assembly": "Lib", "members": [3] },
                { "name": "Inner", "kind": "class", "containing_type": 2, "containing_assembly": "Lib" }
            ]
        }"#,
    )
    .unwrap();
    let (extractor, sink) = new_extractor(ExtractionConfig::default());
    let (status, text) = extract_text(&extractor, &model, UnitSpec::Assembly("Lib".to_string()));

    assert_eq!(status, UnitStatus::Extracted);
    assert!(error_texts(&sink).is_empty());
    check_well_formed(&text);
    for name in ["A", "B", "Inner"] {
        let rows = text
            .lines()
            .filter(|l| l.starts_with("types(") && l.ends_with(&format!(",\"{}\")", name)))
            .count();
        assert_eq!(rows, 1, "types rows for {}", name);
    }

    let inner = label_for(&text, ".Inner;type");
    let method = label_for(&text, ".M(");
    let param = format!(",\"x\",{},0,{})", inner, method);
    assert!(text.lines().any(|l| l.starts_with("params(") && l.ends_with(&param)));
}

#[test]
fn test_parameter_type_with_bad_location_does_not_fail_method() {
    let model = SemanticModel::from_json(
        r#"{
            "assemblies": [{ "name": "Lib", "path": "/bin/Lib.dll" }],
            "symbols": [
                { "name": "B", "kind": "class", "containing_assembly": "Lib", "members": [2] },
                { "name": "A", "kind": "class", "containing_assembly": "Lib",
                  "locations": [{ "tree": 5, "start_line": 1, "start_column": 1, "end_line": 2, "end_column": 1 }] },
                { "name": "M", "kind": "method", "containing_type": 0, "containing_assembly": "Lib",
                  "parameters": [{ "name": "x", "type": 1 }] }
            ]
        }"#,
    )
    .unwrap();
    let (extractor, sink) = new_extractor(ExtractionConfig::default());
    let (status, text) = extract_text(&extractor, &model, UnitSpec::Assembly("Lib".to_string()));

    assert_eq!(status, UnitStatus::Extracted);
    check_well_formed(&text);
    let b = label_for(&text, "B;type");
    let method = label_for(&text, ".M(");
    assert_eq!(count(&text, &format!("methods({},\"M\",{})", method, b)), 1);

    // The failure belongs to A alone.
    let errors: Vec<_> = sink
        .messages()
        .into_iter()
        .filter(|m| m.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].text, "Uncaught exception");
    assert_eq!(errors[0].cause.as_deref(), Some("unknown tree 5"));
    assert_eq!(errors[0].symbol.as_deref(), Some("A"));
    assert_eq!(errors[0].locations, vec!["<unknown>:1:1".to_string()]);
}

// === Compilation ===

#[test]
fn test_compilation_unit() {
    let model = load_fixture("model");
    let (extractor, _sink) = new_extractor(ExtractionConfig::default());
    let (status, text) = extract_text(&extractor, &model, UnitSpec::Compilation);

    assert_eq!(status, UnitStatus::Extracted);
    insta::assert_snapshot!(text.trim_end(), @r#"
#1=*
compilations(#1,"/work")
compilation_args(#1,0,"-unsafe")
#2=@"src/Widget.cs;sourcefile"
files(#2,"src/Widget.cs")
compilation_compiling_files(#1,0,#2)
#3=@"/lib/mscorlib.dll;sourcefile"
files(#3,"/lib/mscorlib.dll")
compilation_referencing_files(#1,0,#3)
"#);
}

// === Driver ===

#[test]
fn test_extract_all_writes_trap_files() {
    let model = load_fixture("model");
    let dir = TempDir::new().unwrap();
    let (extractor, _sink) = new_extractor(ExtractionConfig::default());
    let layout = TrapLayout::new(dir.path(), Compression::Gzip);
    let output = OutputConfig {
        threads: 2,
        ..Default::default()
    };

    let units = UnitSpec::all(&model);
    let reports = extract_all(&extractor, &model, &units, &layout, &output);
    assert_eq!(reports.len(), 4);
    assert!(reports.iter().all(|r| r.status == UnitStatus::Extracted));
    assert_eq!(reports[0].name, "src/Widget.cs");

    let path = dir.path().join("src/Widget.cs.trap.gz");
    assert_eq!(reports[0].path.as_deref(), Some(path.as_path()));
    let mut text = String::new();
    flate2::read::GzDecoder::new(std::fs::File::open(&path).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    check_well_formed(&text);
    assert_eq!(text.lines().count(), reports[0].records);

    assert!(dir.path().join("App.trap.gz").exists());
    assert!(dir.path().join("mscorlib.trap.gz").exists());
    assert!(dir.path().join("compilation.trap.gz").exists());
}

#[test]
fn test_extract_all_skips_existing_without_overwrite() {
    let model = load_fixture("model");
    let dir = TempDir::new().unwrap();
    let (extractor, _sink) = new_extractor(ExtractionConfig::default());
    let layout = TrapLayout::new(dir.path(), Compression::None);
    let units = vec![UnitSpec::Compilation];

    let first = extract_all(&extractor, &model, &units, &layout, &OutputConfig::default());
    assert_eq!(first[0].status, UnitStatus::Extracted);
    let written = std::fs::read_to_string(dir.path().join("compilation.trap")).unwrap();
    assert!(written.starts_with("#1=*\n"));

    let output = OutputConfig {
        overwrite: false,
        ..Default::default()
    };
    let second = extract_all(&extractor, &model, &units, &layout, &output);
    assert_eq!(second[0].status, UnitStatus::Skipped);
    assert_eq!(second[0].records, 0);
}
