#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;

use flate2::write::GzEncoder;
use flate2::Compression;
use zip::write::SimpleFileOptions;

pub fn grant_xml(number: &str, title: &str, inventor: (&str, &str), assignee: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE us-patent-grant SYSTEM "us-patent-grant-v45-2014-04-03.dtd" [ ]>
<us-patent-grant lang="EN" dtd-version="v4.5 2014-04-03">
  <us-bibliographic-data-grant>
    <publication-reference><document-id><country>US</country><doc-number>{number}</doc-number><kind>B2</kind><date>20200107</date></document-id></publication-reference>
    <application-reference appl-type="utility"><document-id><country>US</country><doc-number>16000000</doc-number><date>20180501</date></document-id></application-reference>
    <classifications-cpc><main-cpc><classification-cpc><section>G</section><class>06</class><subclass>F</subclass></classification-cpc></main-cpc></classifications-cpc>
    <invention-title id="t1">{title}</invention-title>
    <us-parties><inventors><inventor sequence="001"><addressbook><last-name>{last}</last-name><first-name>{first}</first-name></addressbook></inventor></inventors></us-parties>
    <assignees><assignee><addressbook><orgname>{assignee}</orgname></addressbook></assignee></assignees>
  </us-bibliographic-data-grant>
</us-patent-grant>
"#,
        first = inventor.0,
        last = inventor.1,
    )
}

pub fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).expect("append tar entry");
    }
    builder.into_inner().expect("finish tar")
}

/// A tar whose single entry name is written verbatim, bypassing the
/// builder's own path checks.
pub fn tar_with_raw_name(name: &str, data: &[u8]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    {
        let raw = header.as_gnu_mut().expect("gnu header");
        raw.name[..name.len()].copy_from_slice(name.as_bytes());
    }
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append(&header, data).expect("append raw entry");
    builder.into_inner().expect("finish tar")
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).expect("start zip entry");
        writer.write_all(data).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Serve `router` on an ephemeral local port.
pub async fn serve(router: axum::Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}
