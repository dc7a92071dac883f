use grantdb_core::{Classification, Patent};
use grantdb_text::{IndexError, PatentIndex};

fn patent(storage_id: &str, number: &str, title: &str, inventors: &[&str], assignee: &str) -> Patent {
	Patent {
		title: title.to_string(),
		number: number.to_string(),
		inventor_names: inventors.iter().map(ToString::to_string).collect(),
		assignee_name: assignee.to_string(),
		application_date: "20190402".to_string(),
		issue_date: "20210105".to_string(),
		classification: Classification { section: "H".into(), class: "04".into(), subclass: "L".into() },
		storage_id: storage_id.to_string(),
	}
}

fn seeded(dir: &std::path::Path) -> anyhow::Result<PatentIndex> {
	let index = PatentIndex::open(dir)?;
	index.index_patent(&patent("s1", "10000001", "Packet routing in mesh networks", &["Grace Hopper"], "Acme Networks"))?;
	index.index_patent(&patent("s2", "10000002", "Solar cell with textured surface", &["Ada Lovelace", "Alan Turing"], "Sunny Corp"))?;
	index.index_patent(&patent("s3", "10000003", "Mesh bag for laundry", &["Alan Kay"], "Home Goods LLC"))?;
	Ok(index)
}

#[test]
fn search_resolves_hits_to_full_patents() -> anyhow::Result<()> {
	let tmp = tempfile::tempdir()?;
	let index = seeded(tmp.path())?;
	assert_eq!(index.num_docs(), 3);

	let hits = index.search("solar")?;
	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0], patent("s2", "10000002", "Solar cell with textured surface", &["Ada Lovelace", "Alan Turing"], "Sunny Corp"));

	let mesh: Vec<String> = index.search("mesh")?.into_iter().map(|p| p.storage_id).collect();
	assert_eq!(mesh.len(), 2);
	assert!(mesh.contains(&"s1".to_string()) && mesh.contains(&"s3".to_string()));

	assert_eq!(index.search("turing")?[0].storage_id, "s2");
	assert_eq!(index.search("10000003")?[0].storage_id, "s3");
	assert_eq!(index.search("assignee:acme")?[0].storage_id, "s1");
	Ok(())
}

#[test]
fn empty_query_and_zero_hits() -> anyhow::Result<()> {
	let tmp = tempfile::tempdir()?;
	let index = seeded(tmp.path())?;
	assert!(matches!(index.search("   "), Err(IndexError::EmptyQuery)));
	assert!(index.search("zeppelin")?.is_empty());
	Ok(())
}

#[test]
fn reindexing_same_id_replaces_the_entry() -> anyhow::Result<()> {
	let tmp = tempfile::tempdir()?;
	let index = seeded(tmp.path())?;
	index.index_patent(&patent("s1", "10000001", "Packet switching fabric", &["Grace Hopper"], "Acme Networks"))?;
	assert_eq!(index.num_docs(), 3);
	assert!(index.search("routing")?.is_empty());
	assert_eq!(index.search("fabric")?[0].title, "Packet switching fabric");
	Ok(())
}

#[test]
fn patent_without_storage_id_is_rejected() -> anyhow::Result<()> {
	let tmp = tempfile::tempdir()?;
	let index = PatentIndex::open(tmp.path())?;
	assert!(matches!(index.index_patent(&Patent::default()), Err(IndexError::MissingId)));
	assert_eq!(index.num_docs(), 0);
	Ok(())
}

#[test]
fn index_survives_reopen() -> anyhow::Result<()> {
	let tmp = tempfile::tempdir()?;
	drop(seeded(tmp.path())?);
	let reopened = PatentIndex::open(tmp.path())?;
	assert_eq!(reopened.num_docs(), 3);
	assert_eq!(reopened.search("laundry")?[0].number, "10000003");
	Ok(())
}
