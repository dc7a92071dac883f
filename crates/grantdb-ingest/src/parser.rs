//! Grant XML decoding and normalization.
//!
//! `parse` keeps the whole document as an element tree; `normalize` pulls the
//! handful of fields the index cares about out of that tree.
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use grantdb_core::{Classification, Patent, RawRecord, XmlElement, XmlNode};

use crate::error::DecodeError;

/// Decode the grant file at `path`.
pub fn parse(path: &Path) -> Result<RawRecord, DecodeError> {
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Io { path: path.to_path_buf(), source })?;
    let root = parse_tree(&bytes)?;
    Ok(RawRecord { source: path.display().to_string(), root })
}

/// Decode an in-memory document into an element tree.
pub fn parse_tree(bytes: &[u8]) -> Result<XmlElement, DecodeError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => stack.push(element(&e)?),
            Event::Empty(e) => attach(&mut stack, &mut root, element(&e)?)?,
            Event::End(_) => {
                // quick-xml rejects mismatched end tags itself
                if let Some(mut done) = stack.pop() {
                    drop_layout_whitespace(&mut done);
                    attach(&mut stack, &mut root, done)?;
                }
            }
            Event::Text(t) => push_text(&mut stack, t.unescape()?.into_owned()),
            Event::CData(c) => push_text(&mut stack, String::from_utf8_lossy(&c.into_inner()).into_owned()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if let Some(open) = stack.pop() {
        return Err(DecodeError::Unterminated(open.name));
    }
    root.ok_or(DecodeError::NoRootElement)
}

fn element(start: &BytesStart<'_>) -> Result<XmlElement, DecodeError> {
    let mut el = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        el.attributes.insert(key, value);
    }
    Ok(el)
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, el: XmlElement) -> Result<(), DecodeError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(el));
        return Ok(());
    }
    if root.is_some() {
        return Err(DecodeError::MultipleRoots);
    }
    *root = Some(el);
    Ok(())
}

fn push_text(stack: &mut [XmlElement], text: String) {
    // text outside the root element is ignored
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Text(text));
    }
}

/// Whitespace-only text is indentation unless its element also carries real
/// text, in which case it separates inline content and is kept.
fn drop_layout_whitespace(el: &mut XmlElement) {
    let has_text = el.children.iter().any(|node| matches!(node, XmlNode::Text(t) if !t.trim().is_empty()));
    if !has_text {
        el.children.retain(|node| !matches!(node, XmlNode::Text(t) if t.trim().is_empty()));
    }
}

/// Build a `Patent` from a decoded grant. Missing optional fields become
/// empty strings; an empty record is an error.
pub fn normalize(record: &RawRecord, storage_id: &str) -> Result<Patent, DecodeError> {
    if record.is_empty() {
        return Err(DecodeError::EmptyRecord);
    }
    let biblio = bibliographic_data(&record.root);
    let publication = biblio.find(&["publication-reference", "document-id"]);
    let application = biblio.find(&["application-reference", "document-id"]);
    Ok(Patent {
        title: collapse_whitespace(&biblio.text_at(&["invention-title"])),
        number: publication.map(|d| d.text_at(&["doc-number"])).unwrap_or_default(),
        inventor_names: inventor_names(biblio),
        assignee_name: assignee_name(biblio),
        application_date: application.map(|d| d.text_at(&["date"])).unwrap_or_default(),
        issue_date: publication.map(|d| d.text_at(&["date"])).unwrap_or_default(),
        classification: classification(biblio),
        storage_id: storage_id.to_string(),
    })
}

/// `us-bibliographic-data-grant` (or its application twin), else the root.
fn bibliographic_data(root: &XmlElement) -> &XmlElement {
    root.elements().find(|el| el.name.starts_with("us-bibliographic-data")).unwrap_or(root)
}

fn parties(biblio: &XmlElement) -> Option<&XmlElement> {
    biblio.child("us-parties").or_else(|| biblio.child("parties"))
}

fn inventor_names(biblio: &XmlElement) -> Vec<String> {
    let Some(inventors) = parties(biblio).and_then(|p| p.child("inventors")) else {
        return Vec::new();
    };
    // one name per entry, in document order, even when parts are missing
    inventors
        .children_named("inventor")
        .map(|inventor| {
            let book = inventor.child("addressbook").unwrap_or(inventor);
            [book.text_at(&["first-name"]), book.text_at(&["last-name"])]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn assignee_name(biblio: &XmlElement) -> String {
    biblio.text_at(&["assignees", "assignee", "addressbook", "orgname"])
}

fn classification(biblio: &XmlElement) -> Classification {
    let primary = biblio
        .find(&["classifications-cpc", "main-cpc", "classification-cpc"])
        .or_else(|| biblio.find(&["classifications-ipcr", "classification-ipcr"]));
    primary
        .map(|c| Classification {
            section: c.text_at(&["section"]),
            class: c.text_at(&["class"]),
            subclass: c.text_at(&["subclass"]),
        })
        .unwrap_or_default()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRANT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE us-patent-grant SYSTEM "us-patent-grant-v45-2014-04-03.dtd" [ ]>
<us-patent-grant lang="EN" dtd-version="v4.5 2014-04-03" file="US10000001-20180619.XML">
  <us-bibliographic-data-grant>
    <publication-reference>
      <document-id><country>US</country><doc-number>10000001</doc-number><kind>B2</kind><date>20180619</date></document-id>
    </publication-reference>
    <application-reference appl-type="utility">
      <document-id><country>US</country><doc-number>14123456</doc-number><date>20150311</date></document-id>
    </application-reference>
    <classifications-cpc>
      <main-cpc>
        <classification-cpc><section>H</section><class>04</class><subclass>L</subclass><main-group>45</main-group></classification-cpc>
      </main-cpc>
    </classifications-cpc>
    <invention-title id="d2e43">Packet routing in <i>mesh</i>
      networks &amp; fabrics</invention-title>
    <us-parties>
      <inventors>
        <inventor sequence="001"><addressbook><last-name>Hopper</last-name><first-name>Grace</first-name></addressbook></inventor>
        <inventor sequence="002"><addressbook><last-name>Lamport</last-name></addressbook></inventor>
      </inventors>
    </us-parties>
    <assignees>
      <assignee><addressbook><orgname>Acme Networks, Inc.</orgname><role>02</role></addressbook></assignee>
    </assignees>
  </us-bibliographic-data-grant>
  <abstract><p><![CDATA[Routing <fast>.]]></p></abstract>
</us-patent-grant>
"#;

    #[test]
    fn parse_keeps_full_tree() -> anyhow::Result<()> {
        let root = parse_tree(GRANT.as_bytes())?;
        assert_eq!(root.name, "us-patent-grant");
        assert_eq!(root.attributes.get("lang").map(String::as_str), Some("EN"));
        assert_eq!(root.text_at(&["abstract", "p"]), "Routing <fast>.");
        Ok(())
    }

    #[test]
    fn normalize_extracts_grant_fields() -> anyhow::Result<()> {
        let record = RawRecord { source: "mem".into(), root: parse_tree(GRANT.as_bytes())? };
        let patent = normalize(&record, "sid-1")?;
        assert_eq!(patent.title, "Packet routing in mesh networks & fabrics");
        assert_eq!(patent.number, "10000001");
        assert_eq!(patent.issue_date, "20180619");
        assert_eq!(patent.application_date, "20150311");
        assert_eq!(patent.inventor_names, vec!["Grace Hopper".to_string(), "Lamport".to_string()]);
        assert_eq!(patent.assignee_name, "Acme Networks, Inc.");
        assert_eq!(patent.classification.symbol(), "H04L");
        assert_eq!(patent.storage_id, "sid-1");
        Ok(())
    }

    #[test]
    fn whitespace_between_inline_elements_is_kept() -> anyhow::Result<()> {
        let xml = "<us-patent-grant><us-bibliographic-data-grant>\n  <invention-title>Culturing <i>E. coli</i> <i>in vitro</i></invention-title>\n</us-bibliographic-data-grant></us-patent-grant>";
        let root = parse_tree(xml.as_bytes())?;
        let biblio = root.child("us-bibliographic-data-grant").expect("biblio");
        // indentation between block elements is not content
        assert!(biblio.children.iter().all(|node| matches!(node, XmlNode::Element(_))));
        let title = biblio.child("invention-title").expect("title");
        assert_eq!(title.children.len(), 4);
        assert_eq!(title.children[2], XmlNode::Text(" ".to_string()));

        let patent = normalize(&RawRecord { source: "mem".into(), root }, "sid-3")?;
        assert_eq!(patent.title, "Culturing E. coli in vitro");
        Ok(())
    }

    #[test]
    fn every_inventor_entry_yields_a_name() -> anyhow::Result<()> {
        let xml = "<us-patent-grant><us-bibliographic-data-grant><us-parties><inventors>\
            <inventor><addressbook><first-name>Ada</first-name><last-name>Lovelace</last-name></addressbook></inventor>\
            <inventor><first-name>Charles</first-name><last-name>Babbage</last-name></inventor>\
            <inventor><addressbook><orgname>Unnamed</orgname></addressbook></inventor>\
            <inventor><addressbook><last-name>Menabrea</last-name></addressbook></inventor>\
            </inventors></us-parties></us-bibliographic-data-grant></us-patent-grant>";
        let record = RawRecord { source: "mem".into(), root: parse_tree(xml.as_bytes())? };
        let patent = normalize(&record, "sid-4")?;
        assert_eq!(patent.inventor_names, vec!["Ada Lovelace", "Charles Babbage", "", "Menabrea"]);
        Ok(())
    }

    #[test]
    fn missing_optional_fields_are_empty() -> anyhow::Result<()> {
        let xml = "<us-patent-grant><us-bibliographic-data-grant><invention-title>Bare</invention-title></us-bibliographic-data-grant></us-patent-grant>";
        let record = RawRecord { source: "mem".into(), root: parse_tree(xml.as_bytes())? };
        let patent = normalize(&record, "sid-2")?;
        assert_eq!(patent.title, "Bare");
        assert!(patent.number.is_empty() && patent.assignee_name.is_empty());
        assert!(patent.inventor_names.is_empty());
        assert_eq!(patent.classification, Classification::default());
        Ok(())
    }

    #[test]
    fn empty_record_is_rejected() {
        assert!(matches!(normalize(&RawRecord::default(), "x"), Err(DecodeError::EmptyRecord)));
    }

    #[test]
    fn malformed_documents_fail() {
        assert!(matches!(parse_tree(b"<a><b></a>"), Err(DecodeError::Xml(_))));
        assert!(matches!(parse_tree(b"<a><b>"), Err(DecodeError::Unterminated(name)) if name == "b"));
        assert!(matches!(parse_tree(b"   "), Err(DecodeError::NoRootElement)));
        assert!(matches!(parse_tree(b"<a/><b/>"), Err(DecodeError::MultipleRoots)));
    }

    #[test]
    fn parse_reads_from_disk() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("grant.xml");
        std::fs::write(&path, GRANT)?;
        let record = parse(&path)?;
        assert_eq!(record.source, path.display().to_string());
        assert!(matches!(parse(&tmp.path().join("missing.xml")), Err(DecodeError::Io { .. })));
        Ok(())
    }
}
