//! Whole-pipeline test: TrakEM2 project file in, result document out.

use std::fs;

use adjacency::driver::{self, RunConfig};
use adjacency::{MeasureParams, ResultStore};
use trakem2::Trakem2Factory;

const PROJECT: &str = r#"<trakem2>
  <t2_layer_set oid="1">
    <t2_layer oid="10" z="0.0">
      <t2_patch oid="11" title="SEC_01.tif"/>
    </t2_layer>
    <t2_layer oid="20" z="1.0">
      <t2_patch oid="21" title="SEC_02.tif"/>
    </t2_layer>
    <t2_area_list oid="100" title="ADAL">
      <t2_area layer_id="10">
        <t2_path d="M 0 0 L 20 0 L 20 20 L 0 20 z"/>
      </t2_area>
    </t2_area_list>
    <t2_area_list oid="101" title="AVAR" transform="matrix(1.0,0.0,0.0,1.0,25.0,0.0)">
      <t2_area layer_id="10">
        <t2_path d="M 0 0 L 20 0 L 20 20 L 0 20 z"/>
      </t2_area>
      <t2_area layer_id="20">
        <t2_path d="M 0 0 L 2 0 L 2 2 L 0 2 z"/>
      </t2_area>
    </t2_area_list>
  </t2_layer_set>
</trakem2>"#;

#[test]
fn project_file_to_result_document() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("project.xml");
    let output = dir.path().join("adjacency.xml");
    fs::write(&project, PROJECT).unwrap();

    let factory = Trakem2Factory::new(&project);
    let mut store = ResultStore::open_or_create(&output).unwrap();
    let config = RunConfig {
        layers: None,
        worker_count: 2,
        // Expand boxes enough to bridge the 5 px gap between the squares
        params: MeasureParams::new(10, 200.0, 1.5).unwrap(),
    };

    let report = driver::run(&factory, &mut store, &config).unwrap();
    assert!(report.all_succeeded());
    assert_eq!(report.completed.len(), 2);

    let reopened = ResultStore::open_or_create(&output).unwrap();
    let doc = reopened.document();
    assert_eq!(doc.len(), 2);

    let first = doc.get("SEC_01.tif").unwrap();
    assert_eq!(first.records.len(), 1);
    assert_eq!(first.records[0].cell1, "ADAL");
    assert_eq!(first.records[0].cell2, "AVAR");
    assert_eq!(first.records[0].adjacency, 2.0);

    // SEC_02's only outline is below the area threshold
    assert!(doc.get("SEC_02.tif").unwrap().records.is_empty());
}

#[test]
fn unreadable_project_fails_per_layer_with_explicit_list() {
    let dir = tempfile::tempdir().unwrap();
    let project = dir.path().join("missing.xml");
    let output = dir.path().join("adjacency.xml");

    let factory = Trakem2Factory::new(&project);
    let mut store = ResultStore::open_or_create(&output).unwrap();
    let config = RunConfig {
        layers: Some(vec!["SEC_01.tif".to_string()]),
        worker_count: 1,
        params: MeasureParams::default(),
    };

    let report = driver::run(&factory, &mut store, &config).unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].layer, "SEC_01.tif");

    // The placeholder for the failed layer is still on disk
    let reopened = ResultStore::open_or_create(&output).unwrap();
    assert!(reopened.document().get("SEC_01.tif").unwrap().records.is_empty());
}
