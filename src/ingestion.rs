use rayon::prelude::*;
use tracing::debug;

use crate::{
    document::{Document, now_millis},
    error::{Error, Result},
    walker::{DiscoveredFile, FileFormat},
};

/// Parse every discovered file into documents, in file order.
///
/// Files are read and parsed in parallel. Documents without an
/// `inserted_at` are stamped with the load time. The first malformed or
/// invalid document fails the whole load, naming its file and line (or
/// array position).
pub fn load_documents(files: &[DiscoveredFile]) -> Result<Vec<Document>> {
    let stamp = now_millis();
    let per_file: Vec<Vec<Document>> = files
        .par_iter()
        .map(|file| -> Result<Vec<Document>> {
            let content = std::fs::read_to_string(&file.absolute_path)?;
            let mut docs = parse(file, &content)?;
            for doc in &mut docs {
                if doc.inserted_at == 0 {
                    doc.inserted_at = stamp;
                }
            }
            debug!(
                file = %file.relative_path.display(),
                documents = docs.len(),
                "parsed upload file"
            );
            Ok(docs)
        })
        .collect::<Result<_>>()?;

    Ok(per_file.into_iter().flatten().collect())
}

fn parse(file: &DiscoveredFile, content: &str) -> Result<Vec<Document>> {
    let name = file.relative_path.display();
    match file.format {
        FileFormat::Json => {
            let value: serde_json::Value = serde_json::from_str(content)
                .map_err(|e| Error::InvalidDocument(format!("{name}: {e}")))?;
            let items = match value {
                serde_json::Value::Array(items) => items,
                other => vec![other],
            };
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let doc: Document = serde_json::from_value(item)
                        .map_err(|e| {
                            Error::InvalidDocument(format!(
                                "{name}: item {}: {e}",
                                i + 1
                            ))
                        })?;
                    checked(doc, || format!("{name}: item {}", i + 1))
                })
                .collect()
        }
        FileFormat::JsonLines => content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                let doc: Document = serde_json::from_str(line).map_err(|e| {
                    Error::InvalidDocument(format!("{name}:{}: {e}", i + 1))
                })?;
                checked(doc, || format!("{name}:{}", i + 1))
            })
            .collect(),
    }
}

fn checked(
    doc: Document,
    location: impl FnOnce() -> String,
) -> Result<Document> {
    match doc.validate() {
        Ok(()) => Ok(doc),
        Err(e) => Err(Error::InvalidDocument(format!("{}: {e}", location()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{document::Language, walker::discover_files};

    #[test]
    fn loads_objects_arrays_and_lines() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("a.json"),
            r#"{"id":"a1","language":"en","title":"Faith","body":"grace"}"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("b.json"),
            r#"[{"sermon_guid":"b1","language":"es","sermon_title":"Fe",
                 "transcription":"gracia","categories":"Fe, Gracia"},
                {"id":"b2","language":"en","title":"Hope","body":"",
                 "inserted_at":7}]"#,
        )
        .unwrap();
        std::fs::write(
            tmp.path().join("c.jsonl"),
            "{\"id\":\"c1\",\"language\":\"en\",\"title\":\"One\",\"body\":\"x\"}\n\n\
             {\"id\":\"c2\",\"language\":\"en\",\"title\":\"Two\",\"body\":\"y\"}\n",
        )
        .unwrap();

        let files = discover_files(tmp.path()).unwrap();
        let docs = load_documents(&files).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a1", "b1", "b2", "c1", "c2"]);

        assert_eq!(docs[1].language, Language::Spanish);
        assert_eq!(docs[1].categories, vec!["Fe", "Gracia"]);
        assert_eq!(docs[2].inserted_at, 7);
        assert!(docs[0].inserted_at > 0);
        assert_eq!(docs[0].inserted_at, docs[3].inserted_at);
    }

    #[test]
    fn bad_line_names_file_and_line() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("bad.jsonl"),
            "{\"id\":\"c1\",\"language\":\"en\",\"title\":\"One\",\"body\":\"x\"}\n\
             {\"id\":\"c2\",\"language\":\"fr\",\"title\":\"Two\",\"body\":\"y\"}\n",
        )
        .unwrap();

        let files = discover_files(tmp.path()).unwrap();
        let err = load_documents(&files).unwrap_err().to_string();
        assert!(err.contains("bad.jsonl:2"), "{err}");
    }

    #[test]
    fn invalid_document_names_array_position() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("batch.json"),
            r#"[{"id":"ok","language":"en","title":"T","body":""},
                {"id":"","language":"en","title":"T","body":""}]"#,
        )
        .unwrap();

        let files = discover_files(tmp.path()).unwrap();
        let err = load_documents(&files).unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));
        assert!(err.to_string().contains("batch.json: item 2"), "{err}");
    }

    #[test]
    fn malformed_json_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{ not json").unwrap();

        let files = discover_files(tmp.path()).unwrap();
        let err = load_documents(&files).unwrap_err().to_string();
        assert!(err.contains("broken.json"), "{err}");
    }
}
