/// Parser for Cobertura XML coverage reports.
///
/// Only the parts needed for line coverage are read:
///   <coverage>
///     <sources><source>...</source></sources>
///     <packages><package><classes>
///       <class filename="...">
///         <methods><method><lines><line number=".." hits=".."/></lines></method></methods>
///         <lines><line number="..." hits="..."/></lines>
///       </class>
///     </classes></package></packages>
///   </coverage>
///
/// A line may be listed under both `<method>` and `<class>`; the highest hit
/// count wins. Several `<class>` elements may share a filename; they are
/// merged downstream by [`CoverageData::merged`].
use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::Result;
use crate::model::{CoverageData, FileCoverage, LineCoverage};
use crate::parsers::Parser;

pub struct CoberturaParser;

impl Parser for CoberturaParser {
    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse_cobertura(input)
    }
}

struct OpenClass {
    path: String,
    hits: BTreeMap<u32, u64>,
}

impl OpenClass {
    fn finish(self) -> FileCoverage {
        FileCoverage {
            path: self.path,
            lines: self
                .hits
                .into_iter()
                .map(|(line_number, hit_count)| LineCoverage {
                    line_number,
                    hit_count,
                })
                .collect(),
        }
    }
}

fn parse_cobertura(input: &[u8]) -> Result<CoverageData> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut data = CoverageData::new();
    let mut buf = Vec::new();
    let mut sources: Vec<String> = Vec::new();
    let mut in_source = false;
    let mut class: Option<OpenClass> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) if e.name().as_ref() == b"source" => in_source = true,
            Event::Text(t) if in_source => {
                sources.push(t.unescape()?.trim().to_string());
            }
            Event::End(e) if e.name().as_ref() == b"source" => in_source = false,
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"class" => {
                    if let Some(done) = class.take() {
                        data.files.push(done.finish());
                    }
                    class = attr(&e, b"filename").map(|filename| OpenClass {
                        path: resolve_source_path(&filename, &sources),
                        hits: BTreeMap::new(),
                    });
                }
                b"line" => {
                    if let Some(open) = class.as_mut() {
                        let number = attr(&e, b"number").and_then(|n| n.parse::<u32>().ok());
                        if let Some(number) = number {
                            let hits = attr(&e, b"hits")
                                .and_then(|h| h.parse::<u64>().ok())
                                .unwrap_or(0);
                            let entry = open.hits.entry(number).or_insert(0);
                            *entry = (*entry).max(hits);
                        }
                    }
                }
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"class" => {
                if let Some(done) = class.take() {
                    data.files.push(done.finish());
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if let Some(done) = class.take() {
        data.files.push(done.finish());
    }

    Ok(data)
}

/// Resolve a filename against the list of `<source>` prefixes: absolute
/// names are kept, relative ones get the first non-empty source prepended.
fn resolve_source_path(filename: &str, sources: &[String]) -> String {
    if filename.starts_with('/') {
        return filename.to_string();
    }
    match sources
        .iter()
        .map(|s| s.trim_end_matches('/'))
        .find(|s| !s.is_empty())
    {
        Some(base) => format!("{base}/{filename}"),
        None => filename.to_string(),
    }
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}
