//! Fixtures shared by the unit tests: executable fake tools and synthetic artifacts.

use std::path::{Path, PathBuf};

use crate::configuration::types::{AnalysisSettings, ReferenceAddresses};

/// Fake filter tool. It reads a text artifact of `<src> <dst>` lines and prints
/// the lines matching `-Y "<family>.<src|dst> == <address>"` as a JSON array,
/// mimicking `-T json` output.
pub const FAKE_FILTER_BODY: &str = r#"
artifact=""
filter=""
while [ $# -gt 0 ]; do
  case "$1" in
    -r) artifact="$2"; shift 2 ;;
    -Y) filter="$2"; shift 2 ;;
    *) shift ;;
  esac
done
HOOK
field=$(echo "$filter" | awk '{print $1}')
value=$(echo "$filter" | awk '{print $3}')
case "$field" in
  *.src) col=1 ;;
  *.dst) col=2 ;;
  *) echo "unsupported filter: $filter" >&2; exit 2 ;;
esac
if [ ! -r "$artifact" ]; then
  echo "The file \"$artifact\" doesn't exist." >&2
  exit 2
fi
awk -v col="$col" -v value="$value" '
  BEGIN { printf "["; n = 0 }
  $col == value {
    if (n > 0) printf ",";
    printf "\n  {\"_source\": {\"layers\": {\"src\": \"%s\", \"dst\": \"%s\"}}}", $1, $2;
    n++
  }
  END { printf "\n]\n" }
' "$artifact"
"#;

/// Writes an executable `/bin/sh` script named `name` into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Writes the fake filter tool, with `hook` inserted right after argument
/// parsing (use it to inject failures or delays for a given `$filter`).
#[cfg(unix)]
pub fn write_fake_filter(dir: &Path, hook: &str) -> PathBuf {
    write_script(dir, "fake-filter", &FAKE_FILTER_BODY.replace("HOOK", hook))
}

/// Writes a synthetic artifact with one `<src> <dst>` line per packet.
pub fn write_artifact(path: &Path, packets: &[(&str, &str)]) {
    let content: String = packets
        .iter()
        .map(|(src, dst)| format!("{} {}\n", src, dst))
        .collect();
    std::fs::write(path, content).unwrap();
}

pub fn scenario_addresses() -> ReferenceAddresses {
    ReferenceAddresses {
        local: "127.0.0.1".parse().unwrap(),
        secondary: "192.168.51.172".parse().unwrap(),
    }
}

/// 3 packets from local, 2 to local, 1 from secondary, 0 to secondary, plus
/// one packet touching neither address.
pub fn scenario_packets() -> Vec<(&'static str, &'static str)> {
    vec![
        ("127.0.0.1", "10.0.0.5"),
        ("127.0.0.1", "10.0.0.6"),
        ("127.0.0.1", "10.0.0.7"),
        ("10.0.0.5", "127.0.0.1"),
        ("10.0.0.6", "127.0.0.1"),
        ("192.168.51.172", "8.8.8.8"),
        ("10.9.9.9", "10.8.8.8"),
    ]
}

pub fn analysis_settings(tool: &Path, output_dir: &Path) -> AnalysisSettings {
    AnalysisSettings {
        tool: tool.to_string_lossy().to_string(),
        local_address: "127.0.0.1".to_string(),
        secondary_address: "192.168.51.172".to_string(),
        secondary_label: "secondary".to_string(),
        output_dir: output_dir.to_path_buf(),
        job_timeout_secs: None,
    }
}
