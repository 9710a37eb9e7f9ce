use cfn_tools::Error;
use cfn_tools::openapi::{Format, OutputFormat, process_openapi};
use cfn_tools::tree::{Value, load_document};
use pretty_assertions::assert_eq;
use std::path::Path;

const PETSTORE: &str = "\
openapi: 3.0.3
info:
  title: Pets
  version: '1.0'
paths:
  /pets:
    parameters:
      - name: limit
        in: query
    get:
      operationId: listPets
      tags: [pets]
    post:
      operationId: createPet
      tags: [pets, admin]
      security:
        - oauth2: [write]
  /pets/{id}:
    get:
      operationId: showPet
      x-internal: true
    delete:
      operationId: deletePet
      security:
        - apiKey: []
  /internal/health:
    get:
      operationId: health
  /internal/metrics:
    get:
      operationId: metrics
";

fn operations(output: &str) -> Vec<String> {
    let doc = load_document(output).unwrap();
    let mut out = Vec::new();
    let paths = doc.get("paths").and_then(Value::as_mapping).unwrap();
    for (path, item) in paths {
        for (method, _) in item.as_mapping().unwrap() {
            if method != "parameters" {
                out.push(format!("{} {}", method, path));
            }
        }
    }
    out
}

#[test]
fn delete_by_security_requirement() {
    let out = process_openapi(
        PETSTORE,
        &["pathMethod : delete : resource.security == 'oauth2'"],
        None,
        OutputFormat::Default,
    )
    .unwrap();
    assert_eq!(
        operations(&out),
        vec![
            "get /pets",
            "get /pets/{id}",
            "delete /pets/{id}",
            "get /internal/health",
            "get /internal/metrics",
        ]
    );
}

#[test]
fn delete_by_extension_and_tag() {
    let out = process_openapi(
        PETSTORE,
        &[
            "pathMethod : delete : resource['x-internal'] == True",
            "pathMethod : delete : 'admin' in resource.tags",
        ],
        None,
        OutputFormat::Yaml,
    )
    .unwrap();
    assert_eq!(
        operations(&out),
        vec![
            "get /pets",
            "delete /pets/{id}",
            "get /internal/health",
            "get /internal/metrics",
        ]
    );
}

#[test]
fn later_rules_see_earlier_deletions() {
    let out = process_openapi(
        PETSTORE,
        &[
            "path : delete : path.startswith('/internal')",
            "pathMethod : delete : path.startswith('/internal') or method == 'delete'",
        ],
        None,
        OutputFormat::Default,
    )
    .unwrap();
    assert_eq!(
        operations(&out),
        vec!["get /pets", "post /pets", "get /pets/{id}"]
    );
}

#[test]
fn path_item_extras_survive_while_operations_remain() {
    let out = process_openapi(PETSTORE, &["pathMethod : delete : method == 'post'"], None, OutputFormat::Default)
        .unwrap();
    let doc = load_document(&out).unwrap();
    let pets = doc.get("paths").and_then(|p| p.get("/pets")).unwrap();
    assert!(pets.get("parameters").is_some());
    assert!(pets.get("post").is_none());
}

#[test]
fn no_rules_keeps_document() {
    let out = process_openapi::<&str>(PETSTORE, &[], None, OutputFormat::Default).unwrap();
    assert_eq!(load_document(&out).unwrap(), load_document(PETSTORE).unwrap());
}

#[test]
fn yaml_in_json_out() {
    let out = process_openapi(
        "paths:\n  /a:\n    get: {}\n    head: {}\n",
        &["pathMethod : delete : method == 'head'"],
        Some(Format::Yaml),
        OutputFormat::Json,
    )
    .unwrap();
    assert_eq!(out, "{\n  \"paths\": {\n    \"/a\": {\n      \"get\": {}\n    }\n  }\n}");
}

#[test]
fn extension_hints() {
    assert_eq!(Format::from_path(Path::new("api.JSON")), Some(Format::Json));
    assert_eq!(Format::from_path(Path::new("api.yml")), Some(Format::Yaml));
    assert_eq!(Format::from_path(Path::new("-")), None);
}

#[test]
fn rule_errors_carry_index_and_source() {
    let err = process_openapi(
        PETSTORE,
        &["path : delete : True", "pathMethod : delete : resource.count > 1"],
        None,
        OutputFormat::Default,
    )
    .unwrap_err();
    match err {
        Error::RuleEvaluation { index, rule, .. } => {
            assert_eq!(index, 1);
            assert_eq!(rule, "pathMethod : delete : resource.count > 1");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn unparseable_input() {
    let err = process_openapi(
        "paths: [unclosed",
        &["path : delete : True"],
        None,
        OutputFormat::Default,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn deeply_nested_predicate_is_rejected() {
    let rule = format!("path : delete : {}True{}", "(".repeat(2000), ")".repeat(2000));
    let err = process_openapi(PETSTORE, &[rule], None, OutputFormat::Default).unwrap_err();
    assert!(matches!(err, Error::RuleEvaluation { index: 0, .. }), "{}", err);
}
