use dr_launch::{
    ArgsCodec, AzureConfig, CodecStrategy, DataDir, GcpConfig, LaunchRequest, Launcher,
    LauncherConfig, MethodRegistry, RecordingBackend, SweepOptions, SweepRequest, SIDECAR_FILE,
};
use dr_sweep::{RunNaming, TimeMode};
use dr_types::{
    DefaultParams, DrError, LaunchContext, MethodCall, Mode, MountSpec, RunConfig, SweepSpec,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn config(dir: &TempDir) -> LauncherConfig {
    LauncherConfig {
        local_log_dir: dir.path().join("logs"),
        launcher_root: dir.path().join("drover"),
        max_blob_bytes: Some(20_000),
        ..LauncherConfig::default()
    }
}

fn grid() -> SweepSpec {
    SweepSpec::new().param("x", [1, 4]).param("y", [3, 4])
}

fn defaults() -> DefaultParams {
    DefaultParams::from([("z".to_string(), json!(10))])
}

fn per_run() -> SweepOptions {
    SweepOptions {
        naming: RunNaming::PerRun,
        time_mode: TimeMode::None,
        ..SweepOptions::default()
    }
}

#[tokio::test]
async fn unknown_mode_submits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::new();
    let launcher = Launcher::new(config(&dir)).with_backend(Mode::Local, Arc::new(backend.clone()));

    let request = SweepRequest::new(MethodCall::shell("true"), grid(), "exp", "unknown_backend");
    let err = launcher.sweep_function(request).await.unwrap_err();

    assert!(matches!(err, DrError::UnknownMode(ref m) if m == "unknown_backend"));
    assert!(backend.is_empty());
}

#[tokio::test]
async fn mode_without_backend_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Launcher::new(config(&dir));
    let request = SweepRequest::new(MethodCall::shell("true"), grid(), "exp", "local");
    let err = launcher.sweep_function(request).await.unwrap_err();
    assert!(matches!(err, DrError::UnsupportedMode { .. }));
}

#[tokio::test]
async fn invalid_spec_aborts_before_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::new();
    let launcher = Launcher::new(config(&dir)).with_backend(Mode::Local, Arc::new(backend.clone()));

    let spec = SweepSpec::new().param("x", Vec::<i32>::new());
    let err = launcher
        .sweep_function(SweepRequest::new(MethodCall::shell("true"), spec, "exp", "local"))
        .await
        .unwrap_err();
    assert!(matches!(err, DrError::InvalidSpec { ref key, .. } if key == "x"));
    assert!(backend.is_empty());
}

#[tokio::test]
async fn local_sweep_submits_one_request_per_config() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::new();
    let launcher = Launcher::new(config(&dir)).with_backend(Mode::Local, Arc::new(backend.clone()));

    let request = SweepRequest::new(MethodCall::shell("train"), grid(), "exp", "local")
        .with_defaults(defaults())
        .with_options(per_run());
    let report = launcher.sweep_function(request).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.dispatched.len(), 4);

    let requests = backend.requests();
    let expected = [(1, 3), (1, 4), (4, 3), (4, 4)];
    for (i, request) in requests.iter().enumerate() {
        assert_eq!(request.sweep_id, report.sweep_id);
        assert_eq!(request.log_path, format!("exp/run{i}"));
        assert_eq!(request.target.docker_image, "drover/runner:latest");

        let points: Vec<&str> = request.mounts.mounts().iter().map(|m| m.mount_point()).collect();
        assert_eq!(points, vec!["/code/drover", "/output"]);
        assert_eq!(
            request.mounts.output(),
            &MountSpec::local_output(dir.path().join("logs").join("exp"), "/output")
        );

        let decoded = ArgsCodec::decode(&request.args, &MethodRegistry::with_builtins()).unwrap();
        let (x, y) = expected[i];
        assert_eq!(decoded.config.get("x"), Some(&json!(x)));
        assert_eq!(decoded.config.get("y"), Some(&json!(y)));
        assert_eq!(decoded.config.get("z"), Some(&json!(10)));
        assert_eq!(decoded.context.output_directory, format!("/output/run{i}"));
    }
}

#[tokio::test]
async fn oversized_run_fails_alone() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::new();
    let launcher = Launcher::new(LauncherConfig {
        azure: Some(AzureConfig::default()),
        ..config(&dir)
    })
    .with_backend(Mode::Azure, Arc::new(backend.clone()));

    let huge = "w".repeat(100_000);
    let spec = SweepSpec::new().param("payload", [json!("a"), json!(huge), json!("c")]);
    let report = launcher
        .sweep_function(SweepRequest::new(MethodCall::shell("true"), spec, "exp", "azure"))
        .await
        .unwrap();

    assert_eq!(report.failed_indices(), vec![1]);
    let submitted: Vec<usize> = backend.requests().iter().map(|r| r.run_index).collect();
    assert_eq!(submitted, vec![0, 2]);
    assert!(report.failures[0].to_string().contains("run 1"));
}

#[tokio::test]
async fn backend_failure_is_reported_and_sweep_continues() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::new().fail_run(2);
    let launcher = Launcher::new(config(&dir)).with_backend(Mode::Local, Arc::new(backend.clone()));

    let report = launcher
        .sweep_function(
            SweepRequest::new(MethodCall::shell("true"), grid(), "exp", "local").with_options(per_run()),
        )
        .await
        .unwrap();

    assert_eq!(report.failed_indices(), vec![2]);
    assert_eq!(backend.len(), 3);
    assert_eq!(report.total(), 4);
}

#[tokio::test]
async fn in_process_runs_see_sidecar_and_own_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = MethodRegistry::with_builtins();
    registry.register(
        "sum",
        |ctx: &LaunchContext, cfg: &RunConfig, _: &Value| -> anyhow::Result<()> {
            let out = Path::new(&ctx.output_directory);
            anyhow::ensure!(out.join(SIDECAR_FILE).is_file(), "sidecar missing");
            let x = cfg.get("x").and_then(Value::as_i64).unwrap_or_default();
            let y = cfg.get("y").and_then(Value::as_i64).unwrap_or_default();
            std::fs::write(out.join("sum.txt"), (x + y).to_string())?;
            Ok(())
        },
    );
    let launcher = Launcher::new(config(&dir)).with_registry(registry);

    let report = launcher
        .sweep_function(
            SweepRequest::new(MethodCall::new("sum"), grid(), "exp", "in_process").with_options(
                SweepOptions {
                    start_run_id: 5,
                    ..per_run()
                },
            ),
        )
        .await
        .unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    let sums: Vec<String> = (5..9)
        .map(|n| {
            let run_dir = dir.path().join("logs").join("exp").join(format!("run{n}"));
            std::fs::read_to_string(run_dir.join("sum.txt")).unwrap()
        })
        .collect();
    assert_eq!(sums, vec!["4", "5", "7", "8"]);
}

#[cfg(unix)]
#[tokio::test]
async fn flat_in_process_runs_share_the_log_dir() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Launcher::new(config(&dir));
    let report = launcher
        .sweep_function(SweepRequest::new(MethodCall::shell("true"), grid(), "exp", "in_process"))
        .await
        .unwrap();

    let expected = dir.path().join("logs").join("exp").to_string_lossy().into_owned();
    assert!(report
        .dispatched
        .iter()
        .all(|run| run.run_path == "exp" && run.output_directory == expected));
}

#[tokio::test]
async fn date_prefix_applies_to_log_path() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::new();
    let launcher = Launcher::new(config(&dir)).with_backend(Mode::Local, Arc::new(backend.clone()));

    let report = launcher
        .sweep_function(
            SweepRequest::new(MethodCall::shell("true"), SweepSpec::new(), "exp", "local").with_options(
                SweepOptions {
                    add_date_to_logname: true,
                    ..SweepOptions::default()
                },
            ),
        )
        .await
        .unwrap();

    let (date, rest) = report.log_path.split_once('_').unwrap();
    assert_eq!(rest, "exp");
    assert!(chrono::NaiveDate::parse_from_str(date, "%y-%m-%d").is_ok());
    assert_eq!(backend.len(), 1);
}

#[tokio::test]
async fn overrides_replace_config_mounts_and_image() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::new();
    let launcher = Launcher::new(LauncherConfig {
        non_code_dirs: vec![DataDir {
            local_dir: "/datasets".into(),
            mount_point: "/data".into(),
            read_only: true,
        }],
        ..config(&dir)
    })
    .with_backend(Mode::Local, Arc::new(backend.clone()));

    let options = SweepOptions {
        docker_image: Some("acme/custom:1".into()),
        non_code_dirs: Some(Vec::new()),
        use_gpu: true,
        num_gpu: 2,
        ..SweepOptions::default()
    };
    launcher
        .sweep_function(
            SweepRequest::new(MethodCall::shell("true"), SweepSpec::new(), "exp", "local")
                .with_options(options),
        )
        .await
        .unwrap();

    let request = &backend.requests()[0];
    assert_eq!(request.target.docker_image, "acme/custom:1");
    assert!(request.mounts.mounts().iter().all(|m| m.mount_point() != "/data"));
    assert_eq!(request.resources.gpu_count(), 2);
}

#[tokio::test]
async fn reference_codec_round_trips_through_backend() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RecordingBackend::new();
    let mut registry = MethodRegistry::new();
    registry.register_with_state(
        "train",
        json!({"epochs": 3}),
        |_: &LaunchContext, _: &RunConfig, _: &Value| -> anyhow::Result<()> { Ok(()) },
    );
    let launcher = Launcher::new(config(&dir))
        .with_registry(registry.clone())
        .with_backend(Mode::Local, Arc::new(backend.clone()));

    let method = MethodCall::new("train").with_state(json!({"epochs": 3}));
    launcher
        .sweep_function(
            SweepRequest::new(method.clone(), grid(), "exp", "local").with_options(SweepOptions {
                codec: CodecStrategy::Reference,
                ..SweepOptions::default()
            }),
        )
        .await
        .unwrap();

    for request in backend.requests() {
        assert_eq!(request.args.version, "reference/1");
        let decoded = ArgsCodec::decode(&request.args, &registry).unwrap();
        assert_eq!(decoded.method, method);
    }
}

#[tokio::test]
async fn spool_backend_writes_requests_for_cloud_modes() {
    let dir = tempfile::tempdir().unwrap();
    let spool = dir.path().join("spool");
    let launcher = Launcher::from_config(LauncherConfig {
        spool_dir: Some(spool.clone()),
        gcp: Some(GcpConfig {
            bucket: "results".into(),
            ..Default::default()
        }),
        ..config(&dir)
    });

    let report = launcher
        .sweep_function(
            SweepRequest::new(MethodCall::shell("true"), grid(), "exp", "gcp").with_options(per_run()),
        )
        .await
        .unwrap();

    let sweep_dir = spool.join("gcp").join(report.sweep_id.to_string());
    for i in 0..4 {
        let stored: LaunchRequest =
            serde_json::from_slice(&std::fs::read(sweep_dir.join(format!("run{i}.json"))).unwrap())
                .unwrap();
        assert_eq!(stored.mode, Mode::Gcp);
        assert_eq!(stored.log_path, format!("exp/run{i}"));
        assert_eq!(stored.resources.instance_type.as_deref(), Some("n1-standard-4"));
        assert!(!stored.interactive);
        assert!(matches!(
            stored.mounts.output(),
            MountSpec::BackendOutput { container, .. } if container == "results"
        ));
    }
}
