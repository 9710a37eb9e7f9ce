use cfn_tools::directive::options::VersionStyle;
use cfn_tools::directive::{Clock, EvalEnv, IdSource, VersionResolver, evaluate, evaluate_file};
use cfn_tools::tree::{References, Tag, Value, load_document};
use cfn_tools::{Error, process_template};
use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

struct FixedIds;

impl IdSource for FixedIds {
    fn next_id(&self) -> String {
        "fixed-id".to_string()
    }
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

struct FixedVersion;

impl VersionResolver for FixedVersion {
    fn resolve(&self, style: VersionStyle) -> cfn_tools::Result<String> {
        Ok(match style {
            VersionStyle::SemVer => "1.4.0-post.2+abc1234".to_string(),
            VersionStyle::Pep440 => "1.4.0.post2.dev0+abc1234".to_string(),
        })
    }
}

fn write(dir: &Path, name: &str, text: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}

fn test_env() -> EvalEnv {
    EvalEnv::default()
        .with_ids(FixedIds)
        .with_clock(FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()))
        .with_versions(FixedVersion)
}

fn field<'a>(doc: &'a Value, path: &[&str]) -> &'a Value {
    path.iter()
        .fold(doc, |node, key| node.get(key).unwrap_or_else(|| panic!("missing {}", key)))
}

#[test]
fn includes_by_extension() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.yaml",
        "Resources: !CFNToolsIncludeFile parts/resources.yaml\n\
         Config: !CFNToolsIncludeFile parts/config.json\n\
         Script: !CFNToolsIncludeFile parts/setup.sh\n",
    );
    write(
        dir.path(),
        "parts/resources.yaml",
        "Bucket:\n  Properties:\n    Name: !Ref BucketName\n    Policy: !CFNToolsIncludeFile policy.yaml\n",
    );
    write(dir.path(), "parts/policy.yaml", "Statement: [{Effect: Allow}]\n");
    write(dir.path(), "parts/config.json", r#"{"retries": 3, "regions": ["us-east-1"]}"#);
    write(dir.path(), "parts/setup.sh", "#!/bin/sh\necho hi\n");

    let doc = evaluate_file(dir.path().join("main.yaml"), &test_env()).unwrap();

    let name = field(&doc, &["Resources", "Bucket", "Properties", "Name"]);
    assert_eq!(name.as_marker().map(|m| m.tag), Some(Tag::Ref));

    // Nested include resolves relative to parts/, not to main.yaml.
    let policy = field(&doc, &["Resources", "Bucket", "Properties", "Policy"]);
    assert_eq!(policy, &load_document("Statement: [{Effect: Allow}]").unwrap());

    let config = field(&doc, &["Config"]);
    assert_eq!(config, &load_document("retries: 3\nregions: [us-east-1]").unwrap());

    assert_eq!(field(&doc, &["Script"]), &Value::from("#!/bin/sh\necho hi\n"));
}

#[test]
fn absolute_include_path() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data.yaml");
    fs::write(&data, "answer: 42\n").unwrap();

    let src = format!("Data: !CFNToolsIncludeFile '{}'\n", data.display());
    let doc = evaluate(load_document(&src).unwrap(), &test_env()).unwrap();
    assert_eq!(field(&doc, &["Data", "answer"]), &Value::from(42_i64));
}

#[test]
fn in_memory_documents_resolve_against_base_dir() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "notes.txt", "plain text");

    let env = test_env().with_base_dir(dir.path());
    let doc = evaluate(load_document("Notes: !CFNToolsIncludeFile notes.txt").unwrap(), &env).unwrap();
    assert_eq!(field(&doc, &["Notes"]), &Value::from("plain text"));
}

#[test]
fn same_file_twice_is_not_a_cycle() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tags.yaml", "- a\n- b\n");
    write(
        dir.path(),
        "main.yaml",
        "A: !CFNToolsIncludeFile tags.yaml\nB: !CFNToolsIncludeFile tags.yaml\n",
    );

    let doc = evaluate_file(dir.path().join("main.yaml"), &test_env()).unwrap();
    assert_eq!(field(&doc, &["A"]), field(&doc, &["B"]));
}

#[test]
fn include_cycle_is_reported_with_chain() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.yaml", "B: !CFNToolsIncludeFile b.yaml\n");
    write(dir.path(), "b.yaml", "A: !CFNToolsIncludeFile a.yaml\n");

    let err = evaluate_file(dir.path().join("a.yaml"), &test_env()).unwrap_err();
    let root = dir.path().canonicalize().unwrap();
    match err {
        Error::IncludeCycle { chain } => assert_eq!(
            chain,
            vec![root.join("a.yaml"), root.join("b.yaml"), root.join("a.yaml")]
        ),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn self_include_is_a_cycle() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "loop.yaml", "Me: !CFNToolsIncludeFile ./loop.yaml\n");
    let err = evaluate_file(dir.path().join("loop.yaml"), &test_env()).unwrap_err();
    assert!(matches!(err, Error::IncludeCycle { ref chain } if chain.len() == 2));
}

#[test]
fn missing_include() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.yaml", "X: !CFNToolsIncludeFile missing.yaml\n");

    let err = evaluate_file(dir.path().join("main.yaml"), &test_env()).unwrap_err();
    match err {
        Error::IncludeNotFound { path } => assert!(path.ends_with("missing.yaml")),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn missing_root_template() {
    let dir = TempDir::new().unwrap();
    let err = evaluate_file(dir.path().join("nope.yaml"), &test_env()).unwrap_err();
    assert!(matches!(err, Error::IncludeNotFound { .. }));
}

#[test]
fn errors_in_included_files_keep_their_position() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.yaml", "Part: !CFNToolsIncludeFile part.yaml\n");
    write(dir.path(), "part.yaml", "ok: 1\nbad: !Join only-one\n");

    let err = evaluate_file(dir.path().join("main.yaml"), &test_env()).unwrap_err();
    match err {
        Error::TagValidation { tag, position, .. } => {
            assert_eq!(tag, "Join");
            assert_eq!(position.map(|p| p.line), Some(2));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn injected_providers() {
    let doc = evaluate(
        load_document(
            "Id: !CFNToolsUUID\n\
             Built: !CFNToolsTimestamp { Format: '%Y%m%d%H%M' }\n\
             Expires: !CFNToolsTimestamp { Offset: 1, OffsetUnit: years, Format: '%Y-%m-%d' }\n\
             Version: !CFNToolsVersion\n\
             PyVersion: !CFNToolsVersion { Style: pep440 }\n",
        )
        .unwrap(),
        &test_env(),
    )
    .unwrap();

    assert_eq!(field(&doc, &["Id"]), &Value::from("fixed-id"));
    assert_eq!(field(&doc, &["Built"]), &Value::from("202403010830"));
    assert_eq!(field(&doc, &["Expires"]), &Value::from("2025-03-01"));
    assert_eq!(field(&doc, &["Version"]), &Value::from("1.4.0-post.2+abc1234"));
    assert_eq!(field(&doc, &["PyVersion"]), &Value::from("1.4.0.post2.dev0+abc1234"));
}

#[test]
fn checksum_of_included_file_bytes() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "lambda/handler.py", "hello");
    write(
        dir.path(),
        "main.yaml",
        "Hash: !CFNToolsCRC file://lambda/handler.py\n\
         Md5: !CFNToolsCRC [ 'file://lambda/handler.py', { Algorithm: md5 } ]\n",
    );

    let doc = evaluate_file(dir.path().join("main.yaml"), &test_env()).unwrap();
    assert_eq!(
        field(&doc, &["Hash"]),
        &Value::from("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
    );
    assert_eq!(field(&doc, &["Md5"]), &Value::from("5d41402abc4b2a76b9719d911017c592"));
}

#[test]
fn checksum_of_missing_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.yaml", "Hash: !CFNToolsCRC file://gone.zip\n");
    let err = evaluate_file(dir.path().join("main.yaml"), &test_env()).unwrap_err();
    assert!(matches!(err, Error::IncludeNotFound { .. }));
}

#[test]
fn to_string_of_included_document() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "policy.yaml", "Effect: Allow\nResource: !GetAtt Bucket.Arn\n");
    write(
        dir.path(),
        "main.yaml",
        "Policy: !CFNToolsToString [ !CFNToolsIncludeFile policy.yaml, { OneLine: true } ]\n",
    );

    let doc = evaluate_file(dir.path().join("main.yaml"), &test_env()).unwrap();
    assert_eq!(
        field(&doc, &["Policy"]),
        &Value::from(r#"{"Effect":"Allow","Resource":{"Fn::GetAtt":["Bucket","Arn"]}}"#)
    );
}

#[test]
fn process_template_shorthand_and_expanded() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "template.yaml",
        "Outputs:\n  Arn:\n    Value: !GetAtt Topic.TopicName\n  Name:\n    Value: !Ref Topic\n  Id:\n    Value: !CFNToolsUUID\n",
    );
    let path = dir.path().join("template.yaml");

    let shorthand = process_template(&path, &test_env(), References::Shorthand).unwrap();
    assert_eq!(
        shorthand,
        "Outputs:\n  Arn:\n    Value: !GetAtt Topic.TopicName\n  Name:\n    Value: !Ref Topic\n  Id:\n    Value: fixed-id\n"
    );

    let expanded = process_template(&path, &test_env(), References::Expanded).unwrap();
    assert_eq!(
        expanded,
        "Outputs:\n  Arn:\n    Value:\n      Fn::GetAtt:\n      - Topic\n      - TopicName\n  Name:\n    Value:\n      Ref: Topic\n  Id:\n    Value: fixed-id\n"
    );
}

#[test]
fn processing_is_deterministic_without_uuid_or_clock() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "body.json", r#"{"k": [1, 2, 3]}"#);
    write(
        dir.path(),
        "template.yaml",
        "Body: !CFNToolsToString [ !CFNToolsIncludeFile body.json ]\n\
         Sum: !CFNToolsCRC [ !CFNToolsIncludeFile body.json, { Encoding: base64 } ]\n\
         Cond: !If [IsProd, !Ref A, !Ref AWS::NoValue]\n",
    );
    let path = dir.path().join("template.yaml");

    let first = process_template(&path, &test_env(), References::Shorthand).unwrap();
    let second = process_template(&path, &test_env(), References::Shorthand).unwrap();
    assert_eq!(first, second);

    // Output is stable under another load/dump cycle.
    let again = cfn_tools::tree::dump_document(&load_document(&first).unwrap(), References::Shorthand)
        .unwrap();
    assert_eq!(again, first);
}
