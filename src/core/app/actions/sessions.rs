use crate::core::app::App;

pub(super) fn new_session(app: &mut App) {
    let title = app.sessions.create_session().title().to_string();
    app.notify(format!("Started: {title}"));
}

pub(super) fn switch_session(app: &mut App, index: usize) {
    let Some(id) = session_id_at(app, index) else {
        app.notify(format!("No session #{}", index + 1));
        return;
    };
    app.sessions.switch_to(&id);
    let title = app.sessions.active().title().to_string();
    app.notify(format!("Switched to: {title}"));
}

pub(super) fn delete_session(app: &mut App, index: usize) {
    let Some(id) = session_id_at(app, index) else {
        app.notify(format!("No session #{}", index + 1));
        return;
    };
    app.cancel_exchange(&id);
    app.sessions.delete_session(&id);
    let title = app.sessions.active().title().to_string();
    app.notify(format!("Deleted session. Active: {title}"));
}

fn session_id_at(app: &App, index: usize) -> Option<String> {
    app.sessions
        .sessions()
        .get(index)
        .map(|session| session.id().to_string())
}
