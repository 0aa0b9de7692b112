use std::time::Duration;

use client_core::{SessionController, SessionState, SurfaceState};

use crate::controller::{events::UiAction, orchestration::apply_action};

const SERVERS_PANEL_WIDTH: f32 = 200.0;
const CHANNELS_PANEL_WIDTH: f32 = 180.0;
const IDLE_REPAINT_INTERVAL: Duration = Duration::from_millis(100);

const INSTRUCTIONS: [&str; 4] = [
    "Enter the bot token and press \"Start the Bot\".",
    "Choose a server from the list on the left.",
    "Choose one of its text channels.",
    "Read the chat and type below to send messages as the bot.",
];

pub struct ControlSurfaceApp {
    controller: SessionController,
    token: String,
    status: String,
    show_instructions: bool,
    applied_title: String,
}

impl ControlSurfaceApp {
    pub fn new(cc: &eframe::CreationContext<'_>, controller: SessionController) -> Self {
        let egui_ctx = cc.egui_ctx.clone();
        if !controller
            .dispatcher()
            .set_waker(move || egui_ctx.request_repaint())
        {
            tracing::warn!("dispatcher waker was already installed");
        }
        Self {
            controller,
            token: String::new(),
            status: String::new(),
            show_instructions: true,
            applied_title: String::new(),
        }
    }

    fn render(&mut self, ctx: &egui::Context, state: &mut SurfaceState, actions: &mut Vec<UiAction>) {
        if state.window_title() != self.applied_title {
            self.applied_title = state.window_title().to_string();
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(self.applied_title.clone()));
        }

        self.show_control_bar(ctx, state, actions);
        self.show_servers_panel(ctx, state, actions);
        self.show_channels_panel(ctx, state, actions);
        self.show_composer(ctx, state, actions);
        self.show_chat(ctx, state, actions);
        self.show_instructions_window(ctx);
        self.show_notice_window(ctx, state, actions);
    }

    fn show_control_bar(
        &mut self,
        ctx: &egui::Context,
        state: &SurfaceState,
        actions: &mut Vec<UiAction>,
    ) {
        egui::TopBottomPanel::top("control_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.label("Bot token");
                let idle = state.session_state() == SessionState::Idle;
                ui.add_enabled(
                    idle && state.controls_enabled(),
                    egui::TextEdit::singleline(&mut self.token)
                        .password(true)
                        .desired_width(320.0),
                );
                let toggle = egui::Button::new(state.control_label());
                if ui.add_enabled(state.controls_enabled(), toggle).clicked() {
                    actions.push(UiAction::ToggleSession);
                }
                ui.separator();
                ui.label(format!("Session: {}", state.session_state()));
                if ui.small_button("?").on_hover_text("Show instructions").clicked() {
                    self.show_instructions = true;
                }
            });
            if !self.status.is_empty() {
                ui.colored_label(ui.visuals().warn_fg_color, self.status.as_str());
            }
            ui.add_space(4.0);
        });
    }

    fn show_servers_panel(
        &self,
        ctx: &egui::Context,
        state: &SurfaceState,
        actions: &mut Vec<UiAction>,
    ) {
        egui::SidePanel::left("servers_panel")
            .default_width(SERVERS_PANEL_WIDTH)
            .show(ctx, |ui| {
                ui.heading("Servers");
                ui.separator();
                let collections = state.collections();
                let selected = collections.selection().server().map(|server| server.id);
                egui::ScrollArea::vertical()
                    .id_salt("servers_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        ui.add_enabled_ui(state.controls_enabled(), |ui| {
                            for server in collections.servers() {
                                let mut response = ui.selectable_label(
                                    selected == Some(server.id),
                                    server.to_string(),
                                );
                                if let Some(icon) = server.icon_url() {
                                    response = response.on_hover_text(icon);
                                }
                                if response.clicked() {
                                    actions.push(UiAction::SelectServer(server.id));
                                }
                            }
                        });
                    });
            });
    }

    fn show_channels_panel(
        &self,
        ctx: &egui::Context,
        state: &SurfaceState,
        actions: &mut Vec<UiAction>,
    ) {
        egui::SidePanel::left("channels_panel")
            .default_width(CHANNELS_PANEL_WIDTH)
            .show(ctx, |ui| {
                ui.heading("Channels");
                ui.separator();
                let collections = state.collections();
                let selected = collections.selection().channel().map(|channel| channel.id);
                egui::ScrollArea::vertical()
                    .id_salt("channels_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        ui.add_enabled_ui(state.controls_enabled(), |ui| {
                            for channel in collections.channels() {
                                if ui
                                    .selectable_label(
                                        selected == Some(channel.id),
                                        channel.to_string(),
                                    )
                                    .clicked()
                                {
                                    actions.push(UiAction::SelectChannel(channel.id));
                                }
                            }
                        });
                    });
            });
    }

    fn show_composer(
        &self,
        ctx: &egui::Context,
        state: &mut SurfaceState,
        actions: &mut Vec<UiAction>,
    ) {
        egui::TopBottomPanel::bottom("composer_panel").show(ctx, |ui| {
            ui.add_space(6.0);
            let can_send = state.controls_enabled()
                && state.session_state() == SessionState::Running
                && state.collections().selection().channel().is_some();
            let hint = match state.collections().selection().channel() {
                Some(channel) => format!("Message {channel} (Enter to send)"),
                None => "Select a channel to chat".to_string(),
            };
            ui.add_enabled_ui(can_send, |ui| {
                ui.horizontal(|ui| {
                    let send_width = 80.0;
                    let response = ui.add_sized(
                        [ui.available_width() - send_width, 28.0],
                        egui::TextEdit::singleline(state.draft_mut()).hint_text(hint),
                    );
                    let enter_pressed = response.lost_focus()
                        && ui.input(|input| input.key_pressed(egui::Key::Enter));
                    let clicked = ui
                        .add_sized([send_width - 8.0, 28.0], egui::Button::new("Send"))
                        .clicked();
                    if enter_pressed || clicked {
                        actions.push(UiAction::SendDraft);
                        response.request_focus();
                    }
                });
            });
            ui.add_space(6.0);
        });
    }

    fn show_chat(&self, ctx: &egui::Context, state: &SurfaceState, actions: &mut Vec<UiAction>) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let collections = state.collections();
            match collections.selection().channel() {
                Some(channel) => ui.heading(channel.to_string()),
                None => ui.heading("Chat"),
            };
            ui.separator();
            let selected = collections.selection().message().map(|message| message.id);
            egui::ScrollArea::vertical()
                .id_salt("chat_scroll")
                .auto_shrink([false, false])
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for message in collections.messages() {
                        let mut response =
                            ui.selectable_label(selected == Some(message.id), message.to_string());
                        if !message.author_avatar_url.is_empty() {
                            response = response.on_hover_text(message.author_avatar_url.as_str());
                        }
                        if response.clicked() {
                            actions.push(UiAction::SelectMessage(message.id));
                        }
                    }
                });
        });
    }

    fn show_instructions_window(&mut self, ctx: &egui::Context) {
        if !self.show_instructions {
            return;
        }
        let mut close = false;
        egui::Window::new("How to use this bot")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                for (index, step) in INSTRUCTIONS.iter().enumerate() {
                    ui.label(format!("{}. {step}", index + 1));
                }
                ui.add_space(8.0);
                close = ui.button("OK").clicked();
            });
        if close {
            self.show_instructions = false;
        }
    }

    fn show_notice_window(
        &self,
        ctx: &egui::Context,
        state: &SurfaceState,
        actions: &mut Vec<UiAction>,
    ) {
        let Some(notice) = state.pending_notice() else {
            return;
        };
        egui::Window::new(notice.title())
            .id(egui::Id::new("error_notice"))
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(notice.to_string());
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    actions.push(UiAction::DismissNotice);
                }
            });
    }
}

impl eframe::App for ControlSurfaceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let dispatcher = self.controller.dispatcher().clone();
        if let Err(err) = dispatcher.pump() {
            tracing::warn!("dispatcher pump failed: {err}");
        }

        let mut actions = Vec::new();
        if let Err(err) = dispatcher.with_local(|state| self.render(ctx, state, &mut actions)) {
            tracing::warn!("render skipped: {err}");
        }

        let controller = self.controller.clone();
        for action in actions {
            apply_action(&controller, action, &mut self.token, &mut self.status);
        }

        ctx.request_repaint_after(IDLE_REPAINT_INTERVAL);
    }
}
