use restsum_extractor::{scan, ExtractOptions, ScanOptions, SourceReader};
use restsum_protocol::HttpMethod;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
    std::fs::write(path, body).expect("write file");
}

fn routes(root: &Path, kind: &str) -> Vec<(HttpMethod, String, String)> {
    let reader = SourceReader::open(root, kind, ScanOptions::default()).expect("reader");
    scan(&reader, &ExtractOptions::default())
        .candidates
        .into_iter()
        .map(|c| (c.method, c.path_template, c.source.file))
        .collect()
}

#[test]
fn scans_a_mixed_repository_in_path_order() {
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    write(
        root,
        "api/app.py",
        "@app.route('/health')\ndef health():\n    return 'ok'\n",
    );
    write(
        root,
        "web/server.js",
        "router.delete('/sessions/:id', logout);\n",
    );
    write(root, "web/vendor/lib.js", "app.get('/vendored', h);\n");
    write(root, "tests/app_test.py", "@app.route('/only-in-tests')\n");
    write(root, "docs/notes.md", "GET /not-code\n");

    assert_eq!(
        routes(root, "source-tree"),
        vec![
            (HttpMethod::Get, "/health".to_string(), "api/app.py".to_string()),
            (
                HttpMethod::Delete,
                "/sessions/{id}".to_string(),
                "web/server.js".to_string()
            ),
        ]
    );
}

#[test]
fn route_tables_are_read_from_a_single_file() {
    let temp = TempDir::new().expect("tempdir");
    let file = temp.path().join("service.routes");
    std::fs::write(&file, "GET /a handlerA\nPOST /b\n").expect("write table");

    let found = routes(&file, "route-table");
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|(_, _, source)| source == "service.routes"));
}

#[test]
fn restarting_the_reader_yields_identical_candidates() {
    let temp = TempDir::new().expect("tempdir");
    write(
        temp.path(),
        "main.go",
        "r.GET(\"/a\", a)\nr.POST(\"/b\", b)\n",
    );
    let first = routes(temp.path(), "source");
    let second = routes(temp.path(), "source");
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[test]
fn non_utf8_files_are_recorded_as_malformed_and_skipped() {
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    std::fs::create_dir_all(root.join("src")).expect("src dir");
    std::fs::write(root.join("src/binary.js"), b"\xff\xfe router.get('/x', h)\n")
        .expect("write binary");
    write(root, "src/users.js", "router.get('/users', listUsers);\n");

    let reader = SourceReader::open(root, "source-tree", ScanOptions::default()).expect("reader");
    let outcome = scan(&reader, &ExtractOptions::default());

    assert_eq!(outcome.fragments, 1);
    assert_eq!(outcome.candidates.len(), 1);
    assert_eq!(outcome.candidates[0].path_template, "/users");
    assert_eq!(outcome.malformed.len(), 1);
    assert_eq!(outcome.malformed[0].location, "src/binary.js");
    assert!(outcome.malformed[0].reason.contains("not valid UTF-8"));
}
