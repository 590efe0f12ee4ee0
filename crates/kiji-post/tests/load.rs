//! Loading a posts directory end to end.

use std::fs;
use std::path::{Path, PathBuf};

use kiji_markdown::{Block, Compiler, CompilerConfig, DiagnosticKind, HtmlPolicy};
use kiji_post::{PostError, PostLoader, TermCount, category_counts, tag_counts};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn blog() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    write(
        root,
        "2023/first-post.md",
        "---\ntitle: First\ndate: 2023-04-01\ntags: [rust]\ncategories: [notes]\n---\n\
         Hello[^1].\n\n[^1]: Footnote.\n",
    );
    write(
        root,
        "2024/alerts.md",
        "+++\ntitle = \"Alerts\"\npublished = 2024-02-10T08:00:00+09:00\ntags = [\"rust\", \"markdown\"]\n\n\
         [taxonomies]\ncategories = [\"notes\"]\n+++\n:::warning[Careful]\nHot.\n:::\n\n<div>raw</div>\n",
    );
    write(root, "drafts/untitled.md", "# No front matter\n");
    temp
}

#[test]
fn test_load_directory() {
    let temp = blog();
    let paths = PostLoader::discover(temp.path()).unwrap();
    assert_eq!(paths.len(), 3);

    let loaded = PostLoader::new(Compiler::default())
        .with_root(temp.path())
        .load_all(&paths);

    let ids: Vec<&str> = loaded.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["alerts", "first-post"]);

    let alerts = &loaded.posts[0];
    assert_eq!(alerts.source_path, PathBuf::from("2024/alerts.md"));
    assert!(matches!(&alerts.document.blocks[..], [Block::Alert { .. }]));
    assert_eq!(alerts.warnings.len(), 1);
    assert_eq!(alerts.warnings[0].kind, DiagnosticKind::RawHtml);
    assert_eq!(
        alerts.warnings[0].to_string(),
        "2024/alerts.md:13:1: raw HTML `<div>raw</div>` removed"
    );

    let first = &loaded.posts[1];
    assert_eq!(first.metadata.published, "2023-04-01");
    assert_eq!(first.document.footnotes.len(), 1);

    assert_eq!(loaded.errors.len(), 1);
    assert!(matches!(
        &loaded.errors[0],
        PostError::Metadata { path, .. } if path.ends_with("drafts/untitled.md")
    ));
}

#[test]
fn test_term_counts_across_posts() {
    let temp = blog();
    let paths = PostLoader::discover(temp.path()).unwrap();
    let loaded = PostLoader::default().load_all(&paths);

    let term = |name: &str, count| TermCount {
        name: name.to_owned(),
        count,
    };
    assert_eq!(
        tag_counts(&loaded.posts),
        vec![term("rust", 2), term("markdown", 1)]
    );
    assert_eq!(category_counts(&loaded.posts), vec![term("notes", 2)]);
}

#[test]
fn test_ingest_policy_reaches_posts() {
    let temp = blog();
    let loader =
        PostLoader::new(Compiler::new(CompilerConfig::new().with_html_policy(HtmlPolicy::Ingest)));

    let post = loader.load(&temp.path().join("2024/alerts.md")).unwrap();

    assert!(post.warnings.is_empty());
    assert_eq!(post.document.blocks.len(), 2);
}
