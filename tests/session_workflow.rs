use std::fs;
use std::path::Path;

use bbox_annotator::config::Config;
use bbox_annotator::geometry::{BoxCoords, PointerEvent};
use bbox_annotator::navigation::NavState;
use bbox_annotator::session::{Notice, NoticeLevel, Prompt, Session};
use bbox_annotator::store::BoxStore;
use image::{Rgba, RgbaImage};
use tempfile::{TempDir, tempdir};

fn write_png(path: &Path, w: u32, h: u32) {
    RgbaImage::from_pixel(w, h, Rgba([10, 120, 200, 255]))
        .save(path)
        .unwrap();
}

/// img/catA/{a,b}.png plus an undecodable z.png, and img/catB/c.png.
fn workspace() -> (TempDir, Config) {
    let dir = tempdir().unwrap();
    let root = dir.path().join("img");
    fs::create_dir_all(root.join("catA")).unwrap();
    fs::create_dir_all(root.join("catB")).unwrap();
    write_png(&root.join("catA/a.png"), 400, 300);
    write_png(&root.join("catA/b.png"), 400, 300);
    fs::write(root.join("catA/z.png"), b"definitely not a png").unwrap();
    write_png(&root.join("catB/c.png"), 400, 300);

    let config = Config::new(&root, dir.path().join("boxes.db")).with_export_dir(dir.path());
    (dir, config)
}

fn drag(session: &mut Session, from: (f32, f32), to: (f32, f32)) -> Option<i64> {
    session.pointer_pressed(PointerEvent::new(from.0, from.1));
    session.pointer_moved(PointerEvent::new(to.0, to.1));
    session.pointer_released(PointerEvent::new(to.0, to.1))
}

fn levels(notices: &[Notice]) -> Vec<NoticeLevel> {
    notices.iter().map(|n| n.level).collect()
}

fn current_image_id(session: &Session) -> &str {
    &session.displayed().unwrap().image_id
}

#[test]
fn drawing_twice_overwrites_the_box() {
    let (_dir, config) = workspace();
    let mut session = Session::new(config, BoxStore::open_in_memory().unwrap());
    assert_eq!(session.categories(), ["catA", "catB"]);

    session.select_category(0);
    assert_eq!(session.navigator().state(), NavState::ImageDisplayed);
    assert_eq!(current_image_id(&session), "a");

    // 400x300 image centered on the 800x600 canvas at (200, 150)
    let first = drag(&mut session, (220.0, 180.0), (400.0, 360.0)).unwrap();
    assert_eq!(
        session.store().get("a", "catA").unwrap(),
        Some(BoxCoords::from_corners(20, 30, 200, 210))
    );

    // dragged bottom-right to top-left
    let second = drag(&mut session, (300.0, 250.0), (210.0, 160.0)).unwrap();
    assert_eq!(first, second);
    assert_eq!(session.store().count("catA").unwrap(), 1);
    assert_eq!(
        session.store().get("a", "catA").unwrap(),
        Some(BoxCoords::from_corners(10, 10, 100, 100))
    );
}

#[test]
fn tiny_drags_are_discarded() {
    let (_dir, config) = workspace();
    let mut session = Session::new(config, BoxStore::open_in_memory().unwrap());
    session.select_category(0);

    assert_eq!(drag(&mut session, (220.0, 180.0), (223.0, 260.0)), None);
    assert_eq!(session.store().count("catA").unwrap(), 0);
    assert!(session.displayed().unwrap().stored.is_none());

    // exactly the minimum size is kept
    assert!(drag(&mut session, (220.0, 180.0), (225.0, 185.0)).is_some());
}

#[test]
fn navigation_skips_broken_images_and_cycles_categories() {
    let (_dir, config) = workspace();
    let mut session = Session::new(config, BoxStore::open_in_memory().unwrap());
    session.select_category(0);
    assert!(session.take_notices().is_empty());

    session.previous_image();
    assert_eq!(levels(&session.take_notices()), [NoticeLevel::Info]);
    assert_eq!(current_image_id(&session), "a");

    session.next_image();
    assert_eq!(current_image_id(&session), "b");
    assert_eq!(session.navigator().position(), Some((1, 3)));

    // z.png cannot be decoded: reported, skipped, and the category is finished
    session.next_image();
    assert_eq!(levels(&session.take_notices()), [NoticeLevel::Error]);
    assert_eq!(current_image_id(&session), "b");
    assert_eq!(
        session.prompt(),
        Some(&Prompt::CycleCategory {
            finished: "catA".into(),
            next_index: 1,
            next: "catB".into(),
        })
    );

    // navigation waits for the answer
    session.previous_image();
    assert_eq!(current_image_id(&session), "b");

    session.answer_prompt(true);
    assert_eq!(session.prompt(), None);
    assert_eq!(session.navigator().selected_category(), Some("catB"));
    assert_eq!(current_image_id(&session), "c");

    // the last category wraps around to the first
    session.next_image();
    let Some(Prompt::CycleCategory { next_index, .. }) = session.prompt().cloned() else {
        panic!("expected a prompt");
    };
    assert_eq!(next_index, 0);

    session.answer_prompt(false);
    assert_eq!(levels(&session.take_notices()), [NoticeLevel::Info]);
    assert_eq!(session.navigator().selected_category(), Some("catB"));
    assert_eq!(current_image_id(&session), "c");
}

#[test]
fn previous_skips_back_over_broken_images() {
    let (_dir, config) = workspace();
    let mut session = Session::new(config, BoxStore::open_in_memory().unwrap());
    session.select_category(0);
    session.jump_to(1);
    assert_eq!(current_image_id(&session), "b");

    session.jump_to(2);
    assert_eq!(levels(&session.take_notices()), [NoticeLevel::Error]);
    assert_eq!(current_image_id(&session), "b");

    session.previous_image();
    assert_eq!(current_image_id(&session), "a");
}

#[test]
fn undo_then_export_leaves_nothing_to_write() {
    let (dir, config) = workspace();
    let mut session = Session::new(config, BoxStore::open_in_memory().unwrap());
    session.select_category(0);
    drag(&mut session, (220.0, 180.0), (400.0, 360.0)).unwrap();

    session.undo_last_box();
    assert!(session.displayed().unwrap().stored.is_none());
    assert_eq!(session.store().count("catA").unwrap(), 0);
    session.take_notices();

    session.export_current();
    assert_eq!(levels(&session.take_notices()), [NoticeLevel::Info]);
    assert!(!dir.path().join("catA_bounding_boxes.csv").exists());
}

#[test]
fn export_writes_one_row_per_annotated_image() {
    let (dir, config) = workspace();
    let mut session = Session::new(config, BoxStore::open_in_memory().unwrap());
    session.select_category(0);
    drag(&mut session, (220.0, 180.0), (400.0, 360.0)).unwrap();
    session.next_image();
    drag(&mut session, (200.0, 150.0), (600.0, 450.0)).unwrap();

    let progress = session.progress().unwrap();
    assert_eq!((progress.processed, progress.total), (2, 3));

    session.export_current();
    let text = fs::read_to_string(dir.path().join("catA_bounding_boxes.csv")).unwrap();
    assert_eq!(
        text,
        "Image ID,Kategorie,X1,Y1,X2,Y2\na,catA,20,30,200,210\nb,catA,0,0,400,300\n"
    );
}

#[test]
fn boxes_survive_reopening_the_database() {
    let (_dir, config) = workspace();
    {
        let mut session = Session::open(config.clone()).unwrap();
        session.select_category(1);
        drag(&mut session, (220.0, 180.0), (400.0, 360.0)).unwrap();
    }

    let mut session = Session::open(config).unwrap();
    session.select_category(1);
    let stored = session.displayed().unwrap().stored.clone().unwrap();
    assert_eq!(stored.coords, BoxCoords::from_corners(20, 30, 200, 210));
    assert_eq!(session.last_saved(), Some(stored.id));

    // a box loaded from disk can be erased too
    session.undo_last_box();
    assert_eq!(session.store().count("catB").unwrap(), 0);
}

#[test]
fn category_without_decodable_images_keeps_the_current_view() {
    let (_dir, config) = workspace();
    fs::create_dir_all(config.image_root.join("catC")).unwrap();
    fs::write(config.image_root.join("catC/x.png"), b"also not a png").unwrap();
    let mut session = Session::new(config, BoxStore::open_in_memory().unwrap());
    session.select_category(0);
    drag(&mut session, (220.0, 180.0), (400.0, 360.0)).unwrap();
    let saved = session.last_saved();

    session.select_category(2);
    assert_eq!(levels(&session.take_notices()), [NoticeLevel::Error]);
    assert_eq!(session.navigator().state(), NavState::ImageDisplayed);
    assert_eq!(session.navigator().selected_category(), Some("catA"));
    assert_eq!(current_image_id(&session), "a");
    assert_eq!(session.last_saved(), saved);
}

#[test]
fn empty_category_is_selected_with_a_notice() {
    let (_dir, config) = workspace();
    fs::create_dir_all(config.image_root.join("catC")).unwrap();
    let mut session = Session::new(config, BoxStore::open_in_memory().unwrap());
    session.select_category(0);

    session.select_category(2);
    assert_eq!(levels(&session.take_notices()), [NoticeLevel::Info]);
    assert_eq!(session.navigator().state(), NavState::CategorySelected);
    assert_eq!(session.navigator().selected_category(), Some("catC"));
    assert!(session.displayed().is_none());
}
