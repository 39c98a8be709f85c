use imgshrink::{JobParameters, RunEvent, RunOutcome, Runner, StartError};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

mod common;
use common::write_image;

#[test]
fn events_arrive_in_order_and_end_with_finished() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("in");
    let output = tmp.path().join("out");
    write_image(input.join("a.jpg"), 100, 100);
    write_image(input.join("sub/b.png"), 50, 60);

    let runner = Runner::new();
    let handle = runner
        .start(JobParameters::new(input).with_output_dir(output.clone()))
        .unwrap();

    let events: Vec<RunEvent> = handle.events().iter().collect();
    let report = handle.wait().unwrap();

    let lines: Vec<String> = events.iter().map(ToString::to_string).collect();
    assert!(lines[0].starts_with("Started: "));
    assert_eq!(lines[1], "Processed image: a.jpg (100x100 -> 50x50)");
    assert_eq!(lines[2], "Processed image: b.png (50x60 -> 25x30)");
    assert_eq!(lines[3], "Finished: succeeded");
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[3], RunEvent::Finished(r) if r == &report));

    assert!(output.join("a.png").is_file());
    assert!(output.join("sub/b.png").is_file());
    assert!(!runner.is_running());
}

#[test]
fn second_start_is_rejected_while_a_run_is_active() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("in");
    for idx in 0..3 {
        write_image(input.join(format!("big-{idx}.png")), 1500, 1500);
    }
    let params = JobParameters::new(input).with_output_dir(tmp.path().join("out"));

    let runner = Runner::new();
    let handle = runner.start(params.clone()).unwrap();
    assert!(runner.is_running());

    let second = runner.clone().start(params.clone());
    assert!(matches!(second, Err(StartError::AlreadyRunning)));

    let report = handle.wait().unwrap();
    assert_eq!(report.processed_files, 3);
    assert!(!runner.is_running());

    // Free again once the first run is done
    let handle = runner.start(params).unwrap();
    assert_eq!(handle.wait().unwrap().outcome, RunOutcome::Succeeded);
}

#[test]
fn invalid_parameters_do_not_start_a_run() {
    let tmp = tempdir().unwrap();
    let runner = Runner::new();

    let result = runner.start(JobParameters::new(tmp.path().to_path_buf()).with_scale(1.5));
    assert!(matches!(result, Err(StartError::InvalidParameters(_))));
    assert!(!runner.is_running());
}

#[test]
fn fatal_failure_is_distinguishable_from_success() {
    let tmp = tempdir().unwrap();
    let runner = Runner::new();
    let handle = runner
        .start(
            JobParameters::new(tmp.path().join("missing"))
                .with_output_dir(tmp.path().join("out")),
        )
        .unwrap();

    let last = handle.events().iter().last().unwrap();
    let report = handle.wait().unwrap();

    assert!(matches!(report.outcome, RunOutcome::Failed { .. }));
    assert!(matches!(last, RunEvent::Finished(r) if !r.outcome.is_success()));
}

#[test]
fn runner_is_free_when_finished_arrives() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("in");
    write_image(input.join("a.jpg"), 64, 64);
    let params = JobParameters::new(input).with_output_dir(tmp.path().join("out"));

    let runner = Runner::new();
    let handle = runner.start(params.clone()).unwrap();

    let mut restarted = None;
    for event in handle.events().iter() {
        if let RunEvent::Finished(report) = event {
            assert_eq!(report.outcome, RunOutcome::Succeeded);
            assert!(!runner.is_running());
            restarted = Some(runner.start(params.clone()).unwrap());
        }
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "worker did not exit");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handle.wait().unwrap().processed_files, 1);

    let restarted = restarted.expect("Finished event");
    assert_eq!(restarted.wait().unwrap().outcome, RunOutcome::Succeeded);
    assert!(!runner.is_running());
}
