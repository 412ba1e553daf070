use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use ara_loopback::Error;
use ara_loopback::aggregator::{self, AggregateRequest};
use ara_loopback::command::TestType;
use ara_loopback::registry::{Bridge, Registry};
use ara_loopback::report::fill_report;
use ara_loopback::report::ods::OdsDocument;
use ara_loopback::report::sheet_sources;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const DATE: &str = "2016-01-20 10:11:12";
const MODES: [&str; 2] = ["PWM-G1, 1 lane", "PWM-G2, 1 lane"];

fn header() -> String {
    let mut h = vec![
        "date", "description", "operation", "device", "size", "iterations", "error",
    ];
    h.extend([
        "req_min", "req_max", "req_avg", "req_jitter", "lat_min", "lat_max", "lat_avg",
        "lat_jitter", "gb_lat_min", "gb_lat_max", "gb_lat_avg", "gb_lat_jitter",
        "throughput_min", "throughput_max", "throughput_avg", "throughput_jitter",
        "lat_iter_1",
    ]);
    h.join(",")
}

fn line(label: &str, device: &str, errors: i64, stat: &str) -> String {
    let mut f = vec![
        DATE.to_string(),
        label.replace(',', " -"),
        "sink".to_string(),
        device.to_string(),
        "512".to_string(),
        "10".to_string(),
        errors.to_string(),
    ];
    f.extend(std::iter::repeat_n(stat.to_string(), 16));
    f.push("99".to_string());
    f.join(",")
}

/// Two power modes, three trials each, an aggregate row followed by the
/// given bridges (device ids) in every trial.
fn write_capture(path: &Path, device_ids: &[u32]) {
    let mut lines = vec![header()];
    for mode in MODES {
        for trial in 0..3i64 {
            lines.push(line(mode, "aggregate", trial, &format!("{}.7", 100 + trial)));
            for id in device_ids {
                lines.push(line(mode, &format!("endo0:1:{}:1:13", id), trial, "10"));
            }
        }
    }
    fs::write(path, lines.join("\n") + "\n").unwrap();
}

fn chart_sheet(name: &str) -> String {
    format!(
        r#"<table:table table:name="{name}"><table:table-column table:number-columns-repeated="30"/><table:table-row><table:table-cell office:value-type="string"><text:p>{name}</text:p></table:table-cell><table:table-cell table:number-columns-repeated="29"/></table:table-row><table:table-row><table:table-cell table:number-columns-repeated="30"/></table:table-row><table:table-row table:number-rows-repeated="20"><table:table-cell table:number-columns-repeated="30"/></table:table-row></table:table>"#
    )
}

fn write_template(path: &Path, sheets: &[&str]) {
    let body: String = sheets.iter().map(|s| chart_sheet(s)).collect();
    let content = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0"><office:body><office:spreadsheet>{body}</office:spreadsheet></office:body></office:document-content>"#
    );

    let mut zip = ZipWriter::new(File::create(path).unwrap());
    zip.start_file(
        "mimetype",
        FileOptions::default().compression_method(CompressionMethod::Stored),
    )
    .unwrap();
    zip.write_all(b"application/vnd.oasis.opendocument.spreadsheet").unwrap();
    zip.start_file("content.xml", FileOptions::default()).unwrap();
    zip.write_all(content.as_bytes()).unwrap();
    zip.finish().unwrap();
}

/// Builds the request from `--bridge` style names, the way the CLI does.
fn request(bridges: &[&str], out_dir: &Path) -> AggregateRequest {
    AggregateRequest {
        test: TestType::Sink,
        size: 512,
        iterations: 10,
        device_ids: Bridge::parse_list(bridges)
            .unwrap()
            .into_iter()
            .map(Bridge::device_id)
            .collect(),
        out_dir: out_dir.to_path_buf(),
    }
}

fn data_lines(path: &PathBuf) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(|l| l.split(',').map(str::to_string).collect())
        .collect()
}

#[test]
fn test_two_bridges_aggregate_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("sink_512_10.csv");
    write_capture(&raw, &[2, 3]);

    let out = aggregator::aggregate(&raw, &request(&["APB2", "APB3"], dir.path()), &Registry::builtin()).unwrap();

    assert_eq!(out.capture.stem(), "20160120-101112_sink_512_10");
    assert_eq!(out.aggregate, dir.path().join("20160120-101112_sink_512_10_agg.csv"));
    let names: Vec<_> = out.devices.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["APB2", "APB3"]);
    assert_eq!(out.devices[1].path, dir.path().join("20160120-101112_sink_512_10_APB3.csv"));
    assert_eq!(out.configurations, vec!["PWM-G1 - 1 lane", "PWM-G2 - 1 lane"]);

    let agg = fs::read_to_string(&out.aggregate).unwrap();
    assert!(agg.starts_with("date,Unipro Power Mode,operation,device,"));
    assert!(!agg.contains("lat_iter_1"));

    let rows = data_lines(&out.aggregate);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].len(), 23);
    assert_eq!(rows[0][3], "Aggregated");
    // errors 0 + 1 + 2, stats trunc(100.7), trunc(101.7), trunc(102.7) averaged
    assert_eq!(rows[0][6], "3");
    assert_eq!(rows[0][7], "101");

    let apb3 = data_lines(&out.devices[1].path);
    assert_eq!(apb3.len(), 2);
    assert_eq!(apb3[1][3], "APB3");
    assert_eq!(apb3[1][22], "10");

    let template = dir.path().join("template.ods");
    write_template(&template, &["Aggregated", "APB2", "APB3"]);
    let report = out.capture.charts_file(dir.path());
    fill_report(&template, &out.aggregate, &sheet_sources(&out), &raw, &report).unwrap();

    let doc = OdsDocument::open(&report).unwrap();
    assert_eq!(doc.sheet_names(), vec!["Aggregated", "APB2", "APB3", "Data"]);
    assert_eq!(doc.cell_text("Aggregated", 2, 1).as_deref(), Some("PWM-G1 - 1 lane"));
    assert_eq!(doc.cell_text("Aggregated", 3, 7).as_deref(), Some("101"));
    assert_eq!(doc.cell_type("APB2", 2, 7).as_deref(), Some("float"));
    assert_eq!(doc.cell_text("Data", 0, 23).as_deref(), Some("lat_iter_1"));
    // Raw decimals are transcribed as read.
    assert_eq!(doc.cell_text("Data", 1, 7).as_deref(), Some("100.7"));
    assert_eq!(doc.cell_text("Data", 18, 3).as_deref(), Some("endo0:1:3:1:13"));
}

#[test]
fn test_rerun_produces_identical_files() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("sink_512_10.csv");
    write_capture(&raw, &[2]);
    let req = request(&["APB2"], dir.path());

    let first = aggregator::aggregate(&raw, &req, &Registry::builtin()).unwrap();
    let before = fs::read(&first.devices[0].path).unwrap();
    let second = aggregator::aggregate(&raw, &req, &Registry::builtin()).unwrap();

    assert_eq!(first.devices[0].path, second.devices[0].path);
    assert_eq!(fs::read(&second.devices[0].path).unwrap(), before);
}

#[test]
fn test_truncated_capture_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("sink_512_10.csv");
    write_capture(&raw, &[2]);
    let content = fs::read_to_string(&raw).unwrap();
    let kept: Vec<&str> = content.lines().take(12).collect();
    fs::write(&raw, kept.join("\n")).unwrap();

    let out_dir = dir.path().join("out");
    let err = aggregator::aggregate(&raw, &request(&["APB2"], &out_dir), &Registry::builtin()).unwrap_err();

    assert!(matches!(err, Error::Shape { .. }));
    assert!(!out_dir.exists());
}

#[test]
fn test_registry_file_renames_bridge_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("sink_512_10.csv");
    write_capture(&raw, &[2]);
    let registry_file = dir.path().join("registry.json");
    fs::write(&registry_file, r#"{"2": "APB2-left"}"#).unwrap();
    let registry = Registry::load(&registry_file).unwrap();

    let out = aggregator::aggregate(&raw, &request(&["APB2"], dir.path()), &registry).unwrap();

    assert_eq!(out.devices[0].name, "APB2-left");
    assert_eq!(out.devices[0].path, dir.path().join("20160120-101112_sink_512_10_APB2-left.csv"));
    assert_eq!(data_lines(&out.devices[0].path)[0][3], "APB2-left");
}
