#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

pub const BASES: &str = "latitude,longitude\n\
32.500,-117.000\n\
32.530,-117.040\n\
32.470,-116.980\n";

pub const DEMANDS: &str = "lat,long\n\
32.510,-117.010\n\
32.520,-117.030\n\
32.480,-116.990\n\
32.540,-117.050\n";

pub const HOSPITALS: &str = "latitude,longitude\n\
32.525,-117.020\n";

pub const CASES: &str = "id,latitude,longitude,datetime,priority\n\
1,32.510,-117.010,2016-03-01 08:00:00,1\n\
2,32.520,-117.030,2016-03-01 08:05:00,3\n\
3,32.480,-116.990,2016-03-01 08:05:30,4\n\
4,32.540,-117.050,2016-03-01 08:06:00,2\n\
5,32.510,-117.010,2016-03-01 08:07:00,4\n\
6,32.520,-117.030,2016-03-01 09:30:00,4\n";

/// A data directory with bases, demands, hospitals and cases, plus a
/// settings file pointing at it.
pub fn data_dir(extra_settings: &str) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    write(dir.path(), "bases.csv", BASES);
    write(dir.path(), "demands.csv", DEMANDS);
    write(dir.path(), "hospitals.csv", HOSPITALS);
    write(dir.path(), "cases.csv", CASES);

    let filepath = dir.path().display().to_string();
    let settings = format!(
        r#"{{
  "filepath": {filepath:?},
  "bases": "bases.csv",
  "demands": "demands.csv",
  "hospitals": "hospitals.csv"{extra_settings}
}}"#
    );
    write(dir.path(), "settings.json", &settings);
    dir
}

pub fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("write fixture");
}
