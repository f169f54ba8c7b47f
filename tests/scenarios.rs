use std::sync::Arc;

use winstash::{
    Command, Config, WorkspaceService,
    capture::capture,
    desktop::DesktopResolver,
    gate::ActivationGate,
    geometry::{DisplayInfo, Rect, UnitFrame},
    host::{
        WindowSystem,
        memory::{HostCall, MemoryHost, ScriptedPrompter},
    },
    matcher::{MatchPass, WindowMatcher},
    workspace::{WindowDescriptor, Workspace},
};

struct Desk {
    _dir: tempfile::TempDir,
    host: Arc<MemoryHost>,
    prompter: Arc<ScriptedPrompter>,
    service: WorkspaceService<MemoryHost>,
}

fn desk(desktops: usize) -> Desk {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(MemoryHost::new(vec![DisplayInfo::new(
        "Studio Display",
        Rect::new(0.0, 0.0, 1600.0, 1000.0),
    )]));
    host.set_space_count("Studio Display", desktops);
    let prompter = Arc::new(ScriptedPrompter::new());
    let config = Config {
        store_path: dir.path().join("workspaces.json"),
        ..Config::default()
    };
    let service = WorkspaceService::new(host.clone(), prompter.clone(), config);
    service.open();
    Desk {
        _dir: dir,
        host,
        prompter,
        service,
    }
}

fn display(host: &MemoryHost) -> DisplayInfo {
    host.displays()[0].clone()
}

#[test]
fn fresh_capture_is_already_active() {
    let desk = desk(2);
    desk.host
        .open_window("term", "build", Rect::new(0.0, 0.0, 800.0, 1000.0));
    desk.host
        .open_window("editor", "main.rs", Rect::new(800.0, 0.0, 800.0, 1000.0));
    let display = display(&desk.host);
    let workspace = Workspace::new("Now", capture(&*desk.host, &display, &[])).on_desktop(Some(1), true);
    assert!(ActivationGate::new(&*desk.host, &display, 50.0).is_already_active(&workspace));
}

#[tokio::test(start_paused = true)]
async fn second_restore_moves_nothing() {
    let desk = desk(1);
    let term = desk
        .host
        .open_window("term", "build", Rect::new(0.0, 0.0, 800.0, 1000.0));
    desk.service.save("Code", None).unwrap();
    desk.host.drag_window(term, Rect::new(200.0, 200.0, 600.0, 400.0));
    desk.host.open_window("term", "scratch", Rect::new(10.0, 10.0, 300.0, 300.0));

    let first = desk.service.activate("Code").await.unwrap();
    assert!(first.moved() > 0);
    assert!(first.verified);

    desk.host.clear_calls();
    let second = desk.service.activate("Code").await.unwrap();
    assert_eq!(second.moved(), 0);
    assert!(!desk.host.calls().iter().any(HostCall::is_move));
}

#[test]
fn titles_beat_list_order() {
    let display = DisplayInfo::new("Main", Rect::new(0.0, 0.0, 1000.0, 800.0));
    let host = MemoryHost::new(vec![display.clone()]);
    let b = host.open_window("app", "B", Rect::new(500.0, 0.0, 500.0, 800.0));
    let a = host.open_window("app", "A", Rect::new(0.0, 0.0, 500.0, 800.0));
    let saved = [
        WindowDescriptor::new("app", "A", UnitFrame::new(0.0, 0.0, 0.5, 1.0)),
        WindowDescriptor::new("app", "B", UnitFrame::new(0.5, 0.0, 0.5, 1.0)),
    ];
    let outcome = WindowMatcher::new(&display, 50.0)
        .match_windows(&[&saved[0], &saved[1]], &host.app_windows("app"));
    assert_eq!(outcome.window_for(0), Some(a));
    assert_eq!(outcome.window_for(1), Some(b));
    assert!(
        outcome
            .bindings
            .iter()
            .all(|binding| binding.unwrap().pass == MatchPass::Title)
    );
}

#[test]
fn proximity_tolerance_is_fifty_pixels() {
    let display = DisplayInfo::new("Main", Rect::new(0.0, 0.0, 1000.0, 1000.0));
    let host = MemoryHost::new(vec![display.clone()]);
    // Target is 200,200 400x400.
    let saved = WindowDescriptor::new("app", "", UnitFrame::new(0.2, 0.2, 0.4, 0.4));
    let near = host.open_window("app", "", Rect::new(249.0, 151.0, 449.0, 351.0));
    let matcher = WindowMatcher::new(&display, 50.0);
    let outcome = matcher.match_windows(&[&saved], &host.app_windows("app"));
    assert_eq!(outcome.bindings[0].unwrap().pass, MatchPass::Proximity);
    assert_eq!(outcome.window_for(0), Some(near));

    host.drag_window(near, Rect::new(200.0, 200.0, 400.0, 451.0));
    let outcome = matcher.match_windows(&[&saved], &host.app_windows("app"));
    assert_eq!(outcome.bindings[0].unwrap().pass, MatchPass::Fallback);

    host.close_window(near);
    let outcome = matcher.match_windows(&[&saved], &host.app_windows("app"));
    assert_eq!(outcome.needs_creation(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn replace_leaves_a_single_holder() {
    let desk = desk(1);
    desk.service.save("Old", Some('w')).unwrap();
    desk.service.save("Keep", Some('k')).unwrap();

    desk.prompter.push_alert(Some(0));
    desk.service
        .dispatch(Command::Save {
            name: "New".to_string(),
            shortcut: Some('w'),
        })
        .await;

    let saved = desk.service.workspaces();
    let holders: Vec<&str> = saved
        .iter()
        .filter(|w| w.shortcut_key == Some('w'))
        .map(|w| w.name.as_str())
        .collect();
    assert_eq!(holders, vec!["New"]);
    assert!(saved.iter().all(|w| w.name != "Old"));
    assert_eq!(desk.service.shortcut_holder('w').as_deref(), Some("New"));
}

#[tokio::test(start_paused = true)]
async fn declined_duplicate_name_changes_nothing() {
    let desk = desk(1);
    desk.host
        .open_window("term", "build", Rect::new(0.0, 0.0, 800.0, 1000.0));
    desk.service.save("Work", Some('w')).unwrap();
    desk.host
        .open_window("editor", "main.rs", Rect::new(800.0, 0.0, 800.0, 1000.0));
    let before = desk.service.workspaces();

    desk.prompter.push_alert(Some(1));
    desk.service
        .dispatch(Command::Save {
            name: "Work".to_string(),
            shortcut: None,
        })
        .await;
    assert_eq!(desk.service.workspaces(), before);
    assert_eq!(before[0].windows.len(), 1);
}

#[test]
fn ensure_exists_adds_exactly_the_missing_desktops() {
    let host = MemoryHost::new(vec![DisplayInfo::new(
        "Main",
        Rect::new(0.0, 0.0, 1000.0, 800.0),
    )]);
    host.set_space_count("Main", 3);
    let resolver = DesktopResolver::new(&host, "Main");
    resolver.ensure_exists(5).unwrap();
    let requests = host
        .calls()
        .iter()
        .filter(|call| matches!(call, HostCall::AddSpace(_)))
        .count();
    assert_eq!(requests, 2);
    assert!(resolver.count() >= 5);
}

#[tokio::test(start_paused = true)]
async fn save_work_on_desktop_two() {
    let desk = desk(3);
    desk.host.focus_ordinal("Studio Display", 2);
    desk.host
        .open_window("term", "build", Rect::new(0.0, 0.0, 800.0, 1000.0));
    desk.host
        .open_window("editor", "main.rs", Rect::new(800.0, 0.0, 800.0, 1000.0));

    desk.prompter.push_input(Some("Work")).push_input(Some("w"));
    desk.service.dispatch(Command::SaveCurrent).await;

    let saved = desk.service.workspaces();
    assert_eq!(saved.len(), 1);
    let work = &saved[0];
    assert_eq!(work.name, "Work");
    assert_eq!(work.shortcut_key, Some('w'));
    assert_eq!(work.desktop_index, Some(2));
    assert_eq!(work.windows.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn restore_relaunches_and_recreates_windows() {
    let desk = desk(2);
    desk.host.install_app("mail", "Mail", 1);
    desk.host
        .open_window("mail", "Inbox", Rect::new(0.0, 0.0, 800.0, 1000.0));
    desk.host
        .open_window("mail", "Draft", Rect::new(800.0, 0.0, 800.0, 500.0));
    desk.service.save("Mail", Some('m')).unwrap();

    desk.host.quit_app("mail");
    desk.host.focus_ordinal("Studio Display", 2);
    desk.service.dispatch(Command::Shortcut('m')).await;

    let windows = desk.host.app_windows("mail");
    assert_eq!(windows.len(), 2);
    let frames: Vec<Rect> = windows.iter().map(|w| w.frame).collect();
    assert!(frames.contains(&Rect::new(0.0, 0.0, 800.0, 1000.0)));
    assert!(frames.contains(&Rect::new(800.0, 0.0, 800.0, 500.0)));
    assert!(
        desk.host
            .calls()
            .iter()
            .any(|call| matches!(call, HostCall::CreateWindow(_)))
    );
    assert!(
        desk.host
            .notifications()
            .iter()
            .any(|note| note == "Restored \"Mail\"")
    );
}

#[tokio::test(start_paused = true)]
async fn corrupt_store_reads_as_empty() {
    let desk = desk(1);
    std::fs::write(&desk.service.config().store_path, "[{ broken").unwrap();
    assert!(desk.service.workspaces().is_empty());
    desk.service.save("Fresh", None).unwrap();
    assert_eq!(desk.service.workspaces().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn handles_from_an_earlier_session_are_ignored() {
    let first = desk(1);
    first.host.set_spaces_supported(false);
    let a = first
        .host
        .open_window("app", "A", Rect::new(0.0, 0.0, 800.0, 1000.0));
    let b = first
        .host
        .open_window("app", "B", Rect::new(800.0, 0.0, 800.0, 1000.0));
    first.service.save("Split", None).unwrap();
    first.service.close();

    // After a restart the old handles belong to the other window.
    let host = Arc::new(MemoryHost::new(vec![display(&first.host)]));
    host.set_spaces_supported(false);
    while host.open_window("filler", "", Rect::new(0.0, 0.0, 10.0, 10.0)) + 1 < a {}
    host.quit_app("filler");
    let new_b = host.open_window("app", "B", Rect::new(800.0, 0.0, 800.0, 1000.0));
    let new_a = host.open_window("app", "A", Rect::new(0.0, 0.0, 800.0, 1000.0));
    assert_eq!((new_b, new_a), (a, b));

    let config = first.service.config().clone();
    let service = WorkspaceService::new(host.clone(), Arc::new(ScriptedPrompter::new()), config);
    service.open();
    let report = service.activate("Split").await.unwrap();
    assert_eq!(report.moved(), 0);
    assert!(!host.calls().iter().any(HostCall::is_move));
    assert_eq!(host.window(new_a).unwrap().frame, Rect::new(0.0, 0.0, 800.0, 1000.0));
}
