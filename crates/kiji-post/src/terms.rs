//! Tag and category counts across posts.

use std::collections::HashMap;

use serde::Serialize;

use crate::Post;

/// Number of posts carrying a term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TermCount {
    pub name: String,
    pub count: usize,
}

/// Count tags over `posts`, in order of first appearance.
#[must_use]
pub fn tag_counts(posts: &[Post]) -> Vec<TermCount> {
    count_terms(posts.iter().flat_map(|p| &p.metadata.tags))
}

/// Count categories over `posts`, in order of first appearance.
#[must_use]
pub fn category_counts(posts: &[Post]) -> Vec<TermCount> {
    count_terms(posts.iter().flat_map(|p| &p.metadata.categories))
}

fn count_terms<'a>(terms: impl Iterator<Item = &'a String>) -> Vec<TermCount> {
    let mut counts: Vec<TermCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for term in terms {
        if let Some(&i) = index.get(term.as_str()) {
            counts[i].count += 1;
        } else {
            index.insert(term, counts.len());
            counts.push(TermCount {
                name: term.clone(),
                count: 1,
            });
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use kiji_markdown::Document;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::PostMetadata;

    fn post(tags: &[&str], categories: &[&str]) -> Post {
        Post {
            id: "p".to_owned(),
            source_path: PathBuf::from("p.md"),
            metadata: PostMetadata {
                title: None,
                published: "2024-01-01".to_owned(),
                tags: tags.iter().map(|&t| t.to_owned()).collect(),
                categories: categories.iter().map(|&c| c.to_owned()).collect(),
            },
            document: Document::default(),
            warnings: Vec::new(),
        }
    }

    fn counts(pairs: &[(&str, usize)]) -> Vec<TermCount> {
        pairs
            .iter()
            .map(|&(name, count)| TermCount {
                name: name.to_owned(),
                count,
            })
            .collect()
    }

    #[test]
    fn test_counts_keep_first_seen_order() {
        let posts = vec![
            post(&["rust", "cli"], &["notes"]),
            post(&["web"], &[]),
            post(&["cli", "rust"], &["notes", "howto"]),
        ];

        assert_eq!(
            tag_counts(&posts),
            counts(&[("rust", 2), ("cli", 2), ("web", 1)])
        );
        assert_eq!(
            category_counts(&posts),
            counts(&[("notes", 2), ("howto", 1)])
        );
    }

    #[test]
    fn test_counts_empty() {
        assert!(tag_counts(&[]).is_empty());
        assert!(category_counts(&[post(&["a"], &[])]).is_empty());
    }
}
