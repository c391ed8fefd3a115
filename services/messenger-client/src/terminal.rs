// Front-end terminal: halaman login, inbox, dan chat di atas stdin/stdout
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use uuid::Uuid;

use crate::config::ClientContext;
use crate::domain::{ChatRequest, PresenceStatus, Profile, ProfileUpdate};
use crate::error::{AppError, AppResult, ErrorSurface};
use crate::pages::auth::{SignUpInput, SignUpOutcome};
use crate::pages::chat::{ChatPage, ChatUpdate};
use crate::pages::inbox::{InboxPage, InboxUpdate};
use crate::pages::{LoadOutcome, Navigation};
use crate::view::Clock;

type Input = Lines<BufReader<Stdin>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    SignUp {
        email: String,
        password: String,
        username: String,
        display_name: String,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    Me,
    EditProfile(ProfileUpdate),
    Search(String),
    Users(String),
    Filter(String),
    Dm(String),
    Group {
        name: String,
        members: Vec<String>,
    },
    Open(String),
    Requests,
    Request(String),
    Accept(String),
    Decline(String),
    Refresh,
    Status(PresenceStatus),
    Image(String),
    Back,
    Say(String),
    Invalid(String),
}

// Satu baris input -> command; teks tanpa "/" adalah pesan
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Say(line.to_string()));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    let words: Vec<&str> = args.split_whitespace().collect();

    let command = match name.to_lowercase().as_str() {
        "help" | "h" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        "signup" => match words.as_slice() {
            [email, password, username, display @ ..] if !display.is_empty() => Command::SignUp {
                email: email.to_string(),
                password: password.to_string(),
                username: username.to_string(),
                display_name: display.join(" "),
            },
            _ => Command::Invalid("/signup <email> <password> <username> <display name>".into()),
        },
        "login" => match words.as_slice() {
            [email, password] => Command::Login {
                email: email.to_string(),
                password: password.to_string(),
            },
            _ => Command::Invalid("/login <email> <password>".into()),
        },
        "logout" => Command::Logout,
        "me" => Command::Me,
        "profile" => match parse_profile_edit(args) {
            Some(update) => Command::EditProfile(update),
            None => Command::Invalid("/profile username|name|avatar <nilai>".into()),
        },
        "search" => Command::Search(args.to_string()),
        "users" => Command::Users(args.to_string()),
        "filter" => Command::Filter(args.to_string()),
        "dm" if words.len() == 1 => Command::Dm(words[0].to_string()),
        "dm" => Command::Invalid("/dm <no hasil cari | user id>".into()),
        "group" => match args.split_once('|') {
            Some((name, members)) => Command::Group {
                name: name.trim().to_string(),
                members: members.split_whitespace().map(str::to_string).collect(),
            },
            None => Command::Invalid("/group <nama> | <no/id anggota> ...".into()),
        },
        "open" if words.len() == 1 => Command::Open(words[0].to_string()),
        "open" => Command::Invalid("/open <no | conversation id>".into()),
        "requests" => Command::Requests,
        "request" if words.len() == 1 => Command::Request(words[0].to_string()),
        "request" => Command::Invalid("/request <no hasil cari | user id>".into()),
        "accept" if words.len() == 1 => Command::Accept(words[0].to_string()),
        "accept" => Command::Invalid("/accept <no request>".into()),
        "decline" if words.len() == 1 => Command::Decline(words[0].to_string()),
        "decline" => Command::Invalid("/decline <no request>".into()),
        "refresh" => Command::Refresh,
        "status" => match PresenceStatus::parse(args) {
            Some(status) if status != PresenceStatus::Offline => Command::Status(status),
            _ => Command::Invalid("/status online|away".into()),
        },
        "image" if !args.is_empty() => Command::Image(args.to_string()),
        "image" => Command::Invalid("/image <path file>".into()),
        "back" => Command::Back,
        other => Command::Invalid(format!("Command tidak dikenal: /{}", other)),
    };
    Some(command)
}

fn parse_profile_edit(args: &str) -> Option<ProfileUpdate> {
    let (field, value) = args.split_once(char::is_whitespace)?;
    let value = Some(value.trim().to_string());
    let update = match field {
        "username" => ProfileUpdate { username: value, ..ProfileUpdate::default() },
        "name" => ProfileUpdate { display_name: value, ..ProfileUpdate::default() },
        "avatar" => ProfileUpdate { avatar_url: value, ..ProfileUpdate::default() },
        _ => return None,
    };
    Some(update)
}

// Target "3" = item ke-3 dari daftar yang terakhir ditampilkan, selain itu harus UUID
fn resolve_target<T>(target: &str, items: &[T], id_of: impl Fn(&T) -> Uuid) -> Option<Uuid> {
    match target.parse::<usize>() {
        Ok(index) if index >= 1 => items.get(index - 1).map(id_of),
        _ => Uuid::parse_str(target).ok(),
    }
}

fn resolve_user(target: &str, results: &[Profile]) -> Option<Uuid> {
    resolve_target(target, results, |p| p.id)
}

fn resolve_request(target: &str, requests: &[ChatRequest]) -> Option<Uuid> {
    resolve_target(target, requests, |r| r.id)
}

fn alert(err: &AppError) {
    tracing::warn!("Alert: {}", err);
    println!("⚠️  {}", err.user_message());
}

// Error sesuai tempatnya; true bila harus kembali ke login
fn surface(err: &AppError) -> bool {
    match err.surface() {
        ErrorSurface::Alert => {
            alert(err);
            false
        }
        ErrorSurface::Console => {
            tracing::error!("{}", err);
            false
        }
        ErrorSurface::Redirect => {
            tracing::warn!("Redirect ke login: {}", err);
            true
        }
    }
}

fn print_help(page: Navigation) {
    match page {
        Navigation::Login => {
            println!("/signup <email> <password> <username> <display name>");
            println!("/login <email> <password>");
        }
        Navigation::Inbox => {
            println!("/search <kata>   cari user (debounce)   /users <kata>   cari langsung");
            println!("/dm <no|id>      direct chat            /group <nama> | <no|id> ...");
            println!("/open <no|id>    buka percakapan        /filter <kata>  saring inbox");
            println!("/request <no|id> kirim chat request     /requests       request masuk");
            println!("/accept <no>     terima request         /decline <no>   tolak request");
            println!("/me  /profile username|name|avatar <nilai>");
            println!("/refresh  /status online|away  /logout");
        }
        Navigation::Chat(_) => {
            println!("Ketik teks untuk mengirim pesan");
            println!("/image <path>  kirim gambar   /status online|away   /back   /logout");
        }
    }
    println!("/help  /quit");
}

fn print_inbox(page: &InboxPage) {
    let view = page.view(&Clock::local());
    print!("{}", view);
    let unread = view.total_unread();
    if unread > 0 {
        println!("📬 {} pesan belum dibaca", unread);
    }
}

fn print_requests(requests: &[ChatRequest]) {
    if requests.is_empty() {
        println!("  (tidak ada chat request)");
    }
    for (index, request) in requests.iter().enumerate() {
        println!(
            "{:>2}. Request dari {} · {}",
            index + 1,
            request.sender_id,
            request.created_at.format("%d/%m/%Y")
        );
    }
}

fn print_profiles(results: &[Profile]) {
    if results.is_empty() {
        println!("  (tidak ada user)");
    }
    for (index, profile) in results.iter().enumerate() {
        println!(
            "{:>2}. {} (@{}) · {}",
            index + 1,
            profile.display_label(),
            profile.username,
            profile.status.as_str()
        );
    }
}

async fn read_line(input: &mut Input) -> AppResult<Option<String>> {
    Ok(input.next_line().await?)
}

/// Loop utama: pindah halaman sesuai Navigation sampai user keluar
pub async fn run(ctx: ClientContext) -> AppResult<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let mut page = match ctx.auth().restore().await {
        Ok(Some(_)) => Navigation::Inbox,
        Ok(None) => Navigation::Login,
        Err(e) => {
            tracing::warn!("Gagal memulihkan session: {}", e);
            Navigation::Login
        }
    };

    loop {
        tracing::debug!("Navigasi ke {}", page.to_href());
        let next = match page {
            Navigation::Login => login_page(&ctx, &mut input).await?,
            Navigation::Inbox => inbox_page(&ctx, &mut input).await?,
            Navigation::Chat(id) => chat_page(&ctx, &mut input, id).await?,
        };

        match next {
            Some(next) => page = next,
            None => break,
        }
    }

    println!("Sampai jumpa 👋");
    Ok(())
}

async fn login_page(ctx: &ClientContext, input: &mut Input) -> AppResult<Option<Navigation>> {
    println!("== Obrolan · Login ==");
    print_help(Navigation::Login);
    let auth = ctx.auth();

    while let Some(line) = read_line(input).await? {
        let Some(command) = parse_command(&line) else {
            continue;
        };

        match command {
            Command::SignUp {
                email,
                password,
                username,
                display_name,
            } => {
                let form = SignUpInput {
                    email,
                    password,
                    username,
                    display_name,
                };
                match auth.sign_up(form).await {
                    Ok(SignUpOutcome::ConfirmationRequired { user }) => {
                        let email = user.email.unwrap_or_default();
                        println!("📧 Cek email {} untuk konfirmasi, lalu login", email);
                    }
                    Ok(outcome) => return Ok(Some(outcome.next_page())),
                    Err(e) => alert(&e),
                }
            }
            Command::Login { email, password } => match auth.log_in(&email, &password).await {
                Ok(_) => return Ok(Some(Navigation::Inbox)),
                Err(e) => alert(&e),
            },
            Command::Help => print_help(Navigation::Login),
            Command::Quit => return Ok(None),
            Command::Invalid(usage) => println!("{}", usage),
            _ => println!("Login dulu. Ketik /help"),
        }
    }
    Ok(None)
}

async fn inbox_page(ctx: &ClientContext, input: &mut Input) -> AppResult<Option<Navigation>> {
    let mut page = match InboxPage::load(ctx.clone()).await {
        LoadOutcome::Ready(page) => page,
        LoadOutcome::Redirect(to) => return Ok(Some(to)),
    };
    print_inbox(&page);
    if !page.is_live() {
        println!("⚠️  Realtime tidak aktif, gunakan /refresh");
    }
    if !page.pending_requests().is_empty() {
        println!(
            "📨 {} chat request menunggu, ketik /requests",
            page.pending_requests().len()
        );
    }

    loop {
        tokio::select! {
            line = read_line(input) => {
                let Some(line) = line? else {
                    return Ok(None);
                };
                let Some(command) = parse_command(&line) else {
                    continue;
                };
                if let Some(next) = inbox_command(ctx, &mut page, command).await {
                    page.leave();
                    return Ok(next);
                }
            }
            event = page.recv() => {
                match page.apply(event).await {
                    InboxUpdate::Conversation(_) => print_inbox(&page),
                    InboxUpdate::SearchResults(_) => print_profiles(page.search_results()),
                    InboxUpdate::Failed(e) => {
                        if surface(&e) {
                            return Ok(Some(Navigation::Login));
                        }
                    }
                    InboxUpdate::Disconnected => println!("⚠️  Realtime terputus, gunakan /refresh"),
                    InboxUpdate::Ignored => {}
                }
            }
        }
    }
}

// Some(..) = tinggalkan halaman inbox
async fn inbox_command(
    ctx: &ClientContext,
    page: &mut InboxPage,
    command: Command,
) -> Option<Option<Navigation>> {
    match command {
        Command::Search(term) => {
            page.search_users(&term);
        }
        Command::Users(term) => match page.search_users_now(&term).await {
            Ok(results) => print_profiles(results),
            Err(e) => {
                tracing::error!("Pencarian gagal: {}", e);
            }
        },
        Command::Filter(term) => {
            page.set_filter(&term);
            print!("{}", page.view(&Clock::local()));
        }
        Command::Dm(target) => {
            let Some(user_id) = resolve_user(&target, page.search_results()) else {
                println!("User {} tidak dikenal, cari dulu dengan /search", target);
                return None;
            };
            match page.open_direct_chat(user_id).await {
                Ok(id) => return Some(Some(Navigation::Chat(id))),
                Err(e) => alert(&e),
            }
        }
        Command::Group { name, members } => {
            let mut ids = Vec::new();
            for target in &members {
                match resolve_user(target, page.search_results()) {
                    Some(id) => ids.push(id),
                    None => {
                        println!("User {} tidak dikenal", target);
                        return None;
                    }
                }
            }
            match page.create_group(&name, &ids).await {
                Ok(id) => return Some(Some(Navigation::Chat(id))),
                Err(e) => alert(&e),
            }
        }
        Command::Open(target) => {
            let view = page.view(&Clock::local());
            let id = match target.parse::<usize>() {
                Ok(index) if index >= 1 => view.visible().get(index - 1).map(|item| item.id),
                _ => Uuid::parse_str(&target).ok(),
            };
            match id {
                Some(id) => return Some(Some(Navigation::Chat(id))),
                None => println!("Percakapan {} tidak ada", target),
            }
        }
        Command::Requests => print_requests(page.pending_requests()),
        Command::Request(target) => {
            let Some(user_id) = resolve_user(&target, page.search_results()) else {
                println!("User {} tidak dikenal, cari dulu dengan /search", target);
                return None;
            };
            match page.send_chat_request(user_id).await {
                Ok(_) => println!("📨 Chat request terkirim"),
                Err(e) => alert(&e),
            }
        }
        Command::Accept(target) => {
            let Some(request_id) = resolve_request(&target, page.pending_requests()) else {
                println!("Request {} tidak ada, lihat /requests", target);
                return None;
            };
            match page.accept_request(request_id).await {
                Ok(id) => return Some(Some(Navigation::Chat(id))),
                Err(e) => alert(&e),
            }
        }
        Command::Decline(target) => {
            let Some(request_id) = resolve_request(&target, page.pending_requests()) else {
                println!("Request {} tidak ada, lihat /requests", target);
                return None;
            };
            match page.decline_request(request_id).await {
                Ok(()) => println!("Request ditolak"),
                Err(e) => alert(&e),
            }
        }
        Command::Refresh => match page.reload().await {
            Ok(_) => print_inbox(page),
            Err(e) => {
                if surface(&e) {
                    return Some(Some(Navigation::Login));
                }
            }
        },
        Command::Me => show_me(ctx).await,
        Command::EditProfile(update) => edit_profile(ctx, &update).await,
        Command::Status(status) => set_status(ctx, status).await,
        Command::Logout => return Some(Some(log_out(ctx).await)),
        Command::Help => print_help(Navigation::Inbox),
        Command::Quit => return Some(None),
        Command::Invalid(usage) => println!("{}", usage),
        Command::Say(_) | Command::Image(_) | Command::Back => {
            println!("Buka percakapan dulu (/open). Ketik /help")
        }
        Command::SignUp { .. } | Command::Login { .. } => println!("Sudah login"),
    }
    None
}

async fn chat_page(
    ctx: &ClientContext,
    input: &mut Input,
    conversation_id: Uuid,
) -> AppResult<Option<Navigation>> {
    let href = Navigation::Chat(conversation_id).to_href();
    let query = href.split_once('?').map(|(_, query)| query).unwrap_or_default();

    let mut page = match ChatPage::open(ctx.clone(), query).await {
        LoadOutcome::Ready(page) => page,
        LoadOutcome::Redirect(to) => return Ok(Some(to)),
    };
    print!("{}", page.view(&Clock::local()));

    loop {
        tokio::select! {
            line = read_line(input) => {
                let Some(line) = line? else {
                    return Ok(None);
                };
                let Some(command) = parse_command(&line) else {
                    continue;
                };
                if let Some(next) = chat_command(ctx, &mut page, command).await {
                    page.leave();
                    return Ok(next);
                }
            }
            event = page.recv() => {
                match page.apply(event).await {
                    ChatUpdate::Appended(id) | ChatUpdate::UploadFinished(id) => {
                        print_bubble(&page, id);
                    }
                    ChatUpdate::ReadUpdated(_) | ChatUpdate::Ignored => {}
                    ChatUpdate::PresenceChanged(_) => {
                        println!("{}", page.view(&Clock::local()).header);
                    }
                    ChatUpdate::UploadFailed(e) => alert(&e),
                    ChatUpdate::Failed(e) => {
                        if surface(&e) {
                            return Ok(Some(Navigation::Login));
                        }
                    }
                    ChatUpdate::Disconnected => println!("⚠️  Realtime terputus"),
                }
            }
        }
    }
}

fn print_bubble(page: &ChatPage, message_id: Uuid) {
    let view = page.view(&Clock::local());
    if let Some(bubble) = view.bubbles().find(|b| b.id == message_id) {
        println!("{}", bubble);
    };
}

async fn chat_command(
    ctx: &ClientContext,
    page: &mut ChatPage,
    command: Command,
) -> Option<Option<Navigation>> {
    match command {
        Command::Say(text) => {
            match page.send_text(&text).await {
                Ok(Some(message)) => print_bubble(page, message.id),
                Ok(None) => {}
                Err(e) => {
                    alert(&e);
                    if e.is_auth_failure() {
                        return Some(Some(Navigation::Login));
                    }
                }
            }
        }
        Command::Image(path) => {
            let filename = Path::new(&path)
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.clone());
            match tokio::fs::read(&path).await {
                Ok(bytes) => match page.send_image(&filename, bytes, None) {
                    Ok(_) => println!(
                        "[...] Mengupload {} ({} upload berjalan)",
                        filename,
                        page.pending_uploads().len()
                    ),
                    Err(e) => alert(&e),
                },
                Err(e) => alert(&AppError::upload(format!("{} tidak bisa dibaca: {}", path, e))),
            }
        }
        Command::Back => return Some(Some(Navigation::Inbox)),
        Command::Refresh => print!("{}", page.view(&Clock::local())),
        Command::Status(status) => set_status(ctx, status).await,
        Command::Logout => return Some(Some(log_out(ctx).await)),
        Command::Help => print_help(Navigation::Chat(page.conversation_id())),
        Command::Quit => return Some(None),
        Command::Invalid(usage) => println!("{}", usage),
        _ => println!("Tidak tersedia di halaman chat. Ketik /help"),
    }
    None
}

async fn show_me(ctx: &ClientContext) {
    let auth = ctx.auth();
    let user = match auth.current_user().await {
        Ok(Some(user)) => user,
        Ok(None) => {
            println!("Belum login");
            return;
        }
        Err(e) => {
            tracing::error!("Gagal memuat user: {}", e);
            return;
        }
    };
    let email = user.email.unwrap_or_default();

    match auth.get_profile(user.id).await {
        Ok(Some(profile)) => println!(
            "{} (@{}) · {} · {}",
            profile.display_label(),
            profile.username,
            email,
            profile.status.as_str()
        ),
        Ok(None) => println!("{} (profile belum ada)", email),
        Err(e) => tracing::error!("Gagal memuat profile {}: {}", user.id, e),
    }
}

async fn edit_profile(ctx: &ClientContext, update: &ProfileUpdate) {
    let auth = ctx.auth();
    let Some(session) = ctx.backend.current_session().await else {
        println!("Belum login");
        return;
    };
    match auth.update_profile(session.user_id(), update).await {
        Ok(profile) => println!(
            "Profile diperbarui: {} (@{})",
            profile.display_label(),
            profile.username
        ),
        Err(e) => alert(&e),
    }
}

async fn set_status(ctx: &ClientContext, status: PresenceStatus) {
    match ctx.auth().set_visibility(status == PresenceStatus::Online).await {
        Ok(profile) => println!("Status: {}", profile.status.as_str()),
        Err(e) => tracing::error!("Gagal mengubah status: {}", e),
    }
}

async fn log_out(ctx: &ClientContext) -> Navigation {
    if let Err(e) = ctx.auth().log_out().await {
        tracing::error!("Logout gagal: {}", e);
    }
    Navigation::Login
}
