//! Loads the built `cdylib` through the library and plugin repositories and
//! drives the heartbeat to completion.

#![cfg(target_os = "linux")]

use std::fs;
use std::path::PathBuf;

use loam_runtime::loader::register_standard;
use loam_runtime::{Handle, LifecycleState, Runtime};
use pretty_assertions::assert_eq;

/// Finds the shared object cargo built next to this test binary.
fn built_plugin() -> PathBuf {
	let exe = std::env::current_exe().unwrap();
	let deps = exe.parent().unwrap();
	let dirs = [deps, deps.parent().unwrap()];
	dirs.iter()
		.filter_map(|dir| fs::read_dir(dir).ok())
		.flatten()
		.filter_map(|entry| entry.ok())
		.map(|entry| entry.path())
		.find(|path| {
			path.file_name()
				.and_then(|name| name.to_str())
				.is_some_and(|name| name.starts_with("libloam_demo_plugin") && name.ends_with(".so"))
		})
		.unwrap_or_else(|| panic!("libloam_demo_plugin.so not found near {}", deps.display()))
}

#[test]
fn heartbeat_runs_from_shared_object_and_logs_through_host() {
	let dir = tempfile::tempdir().unwrap();
	let log = dir.path().join("loam.log");
	let config = dir.path().join("loam.toml");
	fs::write(
		&config,
		format!(
			r#"
[[application.entities]]
name = "LOGGER"
config = 'filter=info format=compact sink=file:{log}'

[[application.entities]]
name = "libraries"
loader_ref = "LIBRARY_REPOSITORY"

[[application.entities]]
name = "plugins"
loader_ref = "PLUGIN_REPOSITORY"

[[application.entities]]
name = "demo"
loader_ref = "libraries"
config = {{ filename = '{plugin}' }}

[[application.entities]]
name = "heartbeat"
loader_ref = "plugins"
config = {{ library_ref = "demo", constructor = "heartbeat_ctor" }}
"#,
			log = log.display(),
			plugin = built_plugin().display(),
		),
	)
	.unwrap();

	let mut rt = Runtime::new();
	register_standard(&mut rt).unwrap();
	rt.load_file(&config).unwrap();

	let heartbeat = rt.resolve("heartbeat").unwrap();
	assert_eq!(heartbeat, Handle::new(5));
	assert!(rt.entity(heartbeat).unwrap().as_lifecycle().is_some());
	assert_eq!(rt.participants().collect::<Vec<_>>(), [heartbeat]);

	rt.run().unwrap();
	assert_eq!(rt.lifecycle_state(heartbeat), Some(LifecycleState::Finalized));

	let output = fs::read_to_string(&log).unwrap();
	for line in ["beat=1", "beat=2", "beat=3", "shutdown requested", "heartbeat stopped"] {
		assert!(output.contains(line), "missing `{line}` in:\n{output}");
	}
}
