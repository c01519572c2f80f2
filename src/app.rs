//! Desktop front end: category list, drawing canvas and controls.
//!
//! All state lives in the [`Session`]; this module only forwards clicks and
//! pointer positions and paints what the session reports.

use std::path::{Path, PathBuf};

use egui::{Align2, Color32, Key, Pos2, Rect, Sense, Stroke, Vec2};
use log::debug;

use crate::config::PREVIEW_SIZE;
use crate::geometry::PointerEvent;
use crate::session::{Notice, NoticeLevel, Prompt, Session};
use crate::thumbnail::{Thumbnail, decode_fit};

const HELP_TEXT: &str = "\
Welcome to the bounding box annotator!

- Pick a category in the list on the left to show its images.
- Click and drag on the image to draw a bounding box. Releasing the mouse saves it.
  Drawing again on the same image replaces its box.
- Boxes that are already stored are drawn in green.
- Use Previous / Next (or the arrow keys) to move through the images.
  After the last image you are offered the next category.
- Eraser (Ctrl+Z) deletes the last saved box.
- Export writes all boxes of the current category to <category>_bounding_boxes.csv.
- Image preview shows thumbnails of the category; click one to open it.";

const BOUNDS_COLOR: Color32 = Color32::RED;
const STORED_COLOR: Color32 = Color32::from_rgb(0, 190, 60);
const DRAWING_COLOR: Color32 = Color32::from_rgb(100, 200, 200);

struct Preview {
    path: PathBuf,
    name: String,
    processed: bool,
    texture: egui::TextureHandle,
}

pub struct AnnotatorApp {
    session: Session,
    texture: Option<(PathBuf, egui::TextureHandle)>,
    notices: Vec<Notice>,
    show_help: bool,
    previews: Option<Vec<Preview>>,
}

fn to_color_image(thumb: &Thumbnail) -> egui::ColorImage {
    let size = [thumb.width() as usize, thumb.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, thumb.pixels().as_raw())
}

fn index_of(images: &[PathBuf], path: &Path) -> Option<usize> {
    images.iter().position(|p| p == path)
}

fn to_screen(p: PointerEvent, canvas: Rect) -> Pos2 {
    Pos2::new(canvas.left() + p.x, canvas.top() + p.y)
}

fn to_event(pos: Pos2, canvas: Rect) -> PointerEvent {
    PointerEvent::new(pos.x - canvas.left(), pos.y - canvas.top())
}

impl AnnotatorApp {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            texture: None,
            notices: vec![],
            show_help: false,
            previews: None,
        }
    }

    fn modal_open(&self) -> bool {
        self.session.prompt().is_some() || !self.notices.is_empty()
    }

    fn texture_outdated(&self) -> bool {
        let shown = self.texture.as_ref().map(|(path, _)| path);
        let wanted = self.session.displayed().map(|d| &d.path);
        shown != wanted
    }

    fn sync_texture(&mut self, ctx: &egui::Context) {
        let Some(displayed) = self.session.displayed() else {
            self.texture = None;
            return;
        };
        if self
            .texture
            .as_ref()
            .is_some_and(|(path, _)| *path == displayed.path)
        {
            return;
        }
        let texture = ctx.load_texture(
            displayed.path.to_string_lossy(),
            to_color_image(&displayed.thumbnail),
            egui::TextureOptions::LINEAR,
        );
        self.texture = Some((displayed.path.clone(), texture));
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let (undo, next, previous) = ctx.input(|i| {
            (
                i.modifiers.ctrl && i.key_pressed(Key::Z),
                i.key_pressed(Key::ArrowRight),
                i.key_pressed(Key::ArrowLeft),
            )
        });
        if undo {
            self.session.undo_last_box();
        }
        if next {
            self.session.next_image();
        }
        if previous {
            self.session.previous_image();
        }
    }

    fn categories_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Categories");
        if ui.button("Reload").clicked() {
            self.session.reload_categories();
        }
        ui.separator();

        let selected = self.session.navigator().selected_index();
        let mut clicked = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for (i, name) in self.session.categories().iter().enumerate() {
                if ui.selectable_label(selected == Some(i), name.as_str()).clicked() {
                    clicked = Some(i);
                }
            }
        });
        if let Some(i) = clicked {
            self.session.select_category(i);
        }
    }

    fn controls_panel(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("Controls");

        match self.session.navigator().position() {
            Some((index, total)) => ui.label(format!("Image {}/{}", index + 1, total)),
            None => ui.label("No image"),
        };
        if let Some(displayed) = self.session.displayed() {
            ui.label(format!("{} / {}", displayed.category, displayed.image_id));
        }
        if let Some(progress) = self.session.progress() {
            ui.add(egui::ProgressBar::new(progress.fraction()).text(format!(
                "{}/{} annotated",
                progress.processed, progress.total
            )));
        }

        ui.separator();
        ui.horizontal(|ui| {
            if ui.button("Previous").clicked() {
                self.session.previous_image();
            }
            if ui.button("Next").clicked() {
                self.session.next_image();
            }
        });
        if ui.button("Export bounding boxes").clicked() {
            self.session.export_current();
        }
        if ui.button("Eraser (undo last box)").clicked() {
            self.session.undo_last_box();
        }
        if ui.button("Image preview").clicked() {
            self.open_previews(ctx);
        }
        if ui.button("Help").clicked() {
            self.show_help = true;
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let (w, h) = self.session.config().display_size;
        let (response, painter) =
            ui.allocate_painter(Vec2::new(w as f32, h as f32), Sense::click_and_drag());
        let canvas = response.rect;

        if !self.modal_open() {
            if response.drag_started() {
                let origin = ui
                    .input(|i| i.pointer.press_origin())
                    .or(response.interact_pointer_pos());
                if let Some(pos) = origin {
                    self.session.pointer_pressed(to_event(pos, canvas));
                }
            }
            if response.dragged() {
                if let Some(pos) = response.interact_pointer_pos() {
                    self.session.pointer_moved(to_event(pos, canvas));
                }
            }
            if response.drag_released() {
                let end = response
                    .interact_pointer_pos()
                    .or(ui.input(|i| i.pointer.latest_pos()));
                if let Some(pos) = end {
                    self.session.pointer_released(to_event(pos, canvas));
                }
            }
        }

        painter.rect_filled(canvas, 0.0, Color32::WHITE);

        let Some(displayed) = self.session.displayed() else {
            painter.text(
                canvas.center(),
                Align2::CENTER_CENTER,
                "Select a category to start",
                egui::FontId::proportional(18.0),
                Color32::GRAY,
            );
            return;
        };
        let p = displayed.placement;
        let img_rect = Rect::from_min_size(
            to_screen(PointerEvent::new(p.origin_x, p.origin_y), canvas),
            Vec2::new(p.width, p.height),
        );
        if let Some((_, texture)) = &self.texture {
            painter.image(
                texture.id(),
                img_rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }
        painter.rect_stroke(img_rect, 0.0, Stroke::new(1.0, BOUNDS_COLOR));

        if let Some(stored) = &displayed.stored {
            let (a, b) = stored.coords.to_display(&p);
            painter.rect_stroke(
                Rect::from_two_pos(to_screen(a, canvas), to_screen(b, canvas)),
                0.0,
                Stroke::new(2.0, STORED_COLOR),
            );
        }
        if let Some((a, b)) = self.session.in_progress() {
            painter.rect_stroke(
                Rect::from_two_pos(to_screen(a, canvas), to_screen(b, canvas)),
                0.0,
                Stroke::new(2.0, DRAWING_COLOR),
            );
        }
    }

    fn prompt_window(&mut self, ctx: &egui::Context) {
        let Some(Prompt::CycleCategory { finished, next, .. }) = self.session.prompt().cloned()
        else {
            return;
        };
        let mut answer = None;
        egui::Window::new("Category finished")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!(
                    "All images in '{finished}' have been shown. Continue with '{next}'?"
                ));
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        answer = Some(true);
                    }
                    if ui.button("No").clicked() {
                        answer = Some(false);
                    }
                });
            });
        if let Some(yes) = answer {
            self.session.answer_prompt(yes);
        }
    }

    fn notice_window(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.notices.first() else {
            return;
        };
        let title = match notice.level {
            NoticeLevel::Info => "Info",
            NoticeLevel::Error => "Error",
        };
        let mut dismissed = false;
        egui::Window::new(title)
            .id(egui::Id::new("notice"))
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                match notice.level {
                    NoticeLevel::Info => ui.label(notice.message.as_str()),
                    NoticeLevel::Error => ui.colored_label(Color32::RED, notice.message.as_str()),
                };
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.notices.remove(0);
        }
    }

    fn open_previews(&mut self, ctx: &egui::Context) {
        if !self.session.require_category() {
            return;
        }
        let mut previews = vec![];
        for path in self.session.images() {
            match decode_fit(path, PREVIEW_SIZE, PREVIEW_SIZE) {
                Ok(thumb) => previews.push(Preview {
                    path: path.clone(),
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    processed: self.session.is_processed(path),
                    texture: ctx.load_texture(
                        format!("preview:{}", path.display()),
                        to_color_image(&thumb),
                        egui::TextureOptions::LINEAR,
                    ),
                }),
                Err(e) => debug!("no preview: {e}"),
            }
        }
        self.previews = Some(previews);
    }

    /// Closes the preview grid once its images no longer belong to the
    /// selected category.
    fn drop_stale_previews(&mut self) {
        let images = self.session.images();
        let stale = self.previews.as_ref().is_some_and(|previews| {
            previews
                .iter()
                .any(|preview| index_of(images, &preview.path).is_none())
        });
        if stale {
            debug!("category changed, closing previews");
            self.previews = None;
        }
    }

    fn preview_window(&mut self, ctx: &egui::Context) {
        let Some(previews) = &self.previews else {
            return;
        };
        let mut open = true;
        let mut jump = None;
        egui::Window::new("Image preview")
            .open(&mut open)
            .default_size([560.0, 420.0])
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        for preview in previews {
                            ui.vertical(|ui| {
                                let image = egui::Image::new(&preview.texture)
                                    .fit_to_exact_size(preview.texture.size_vec2());
                                if ui.add(egui::ImageButton::new(image)).clicked() {
                                    jump = Some(preview.path.clone());
                                }
                                if preview.processed {
                                    ui.label(format!("{} (done)", preview.name));
                                } else {
                                    ui.label(preview.name.as_str());
                                }
                            });
                        }
                    });
                });
            });
        if let Some(path) = jump {
            match index_of(self.session.images(), &path) {
                Some(index) => self.session.jump_to(index),
                // built for another category
                None => open = false,
            }
        }
        if !open {
            self.previews = None;
        }
    }
}

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if !self.modal_open() {
            self.handle_keys(ctx);
        }

        egui::SidePanel::left("categories_panel")
            .default_width(180.0)
            .show(ctx, |ui| self.categories_panel(ui));

        egui::SidePanel::right("controls_panel")
            .default_width(200.0)
            .show(ctx, |ui| self.controls_panel(ui, ctx));

        egui::CentralPanel::default().show(ctx, |ui| {
            self.sync_texture(ctx);
            self.canvas(ui);
        });

        self.prompt_window(ctx);
        self.notice_window(ctx);
        egui::Window::new("Help")
            .open(&mut self.show_help)
            .show(ctx, |ui| ui.label(HELP_TEXT));
        self.drop_stale_previews();
        self.preview_window(ctx);

        let fresh = self.session.take_notices();
        if !fresh.is_empty() || self.texture_outdated() {
            ctx.request_repaint();
        }
        self.notices.extend(fresh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_paths_resolve_only_within_the_current_list() {
        let cats = vec![PathBuf::from("img/cats/a.png"), PathBuf::from("img/cats/b.png")];
        let dogs = vec![PathBuf::from("img/dogs/a.png")];

        assert_eq!(index_of(&cats, Path::new("img/cats/b.png")), Some(1));
        // a thumbnail built for cats must not open an image of dogs
        assert_eq!(index_of(&dogs, Path::new("img/cats/a.png")), None);
        assert_eq!(index_of(&[], Path::new("img/cats/a.png")), None);
    }
}
