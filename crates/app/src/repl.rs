use std::fmt;
use std::fmt::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use lesson_core::{View, navigation};
use lesson_core::model::{Feedback, User};
use services::{AppServices, LessonSnapshot, ManualReview, PracticeSnapshot, ReviewSnapshot};

/// One line of driver input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(String),
    Logout,
    Lessons,
    Start(usize),
    PrevLesson,
    NextLesson,
    Home,
    Answer(String),
    Next,
    Reveal,
    Confirm,
    Cancel,
    Advance,
    Stay,
    Review,
    ReviewAnswer(String),
    ReviewReveal,
    Close,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    MissingArgument { command: &'static str },
    InvalidLessonNumber { raw: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "type a command, or `help`"),
            CommandError::Unknown(word) => write!(f, "unknown command: {word}"),
            CommandError::MissingArgument { command } => write!(f, "{command} requires an argument"),
            CommandError::InvalidLessonNumber { raw } => {
                write!(f, "lesson number must be 1 or greater, got {raw:?}")
            }
        }
    }
}

impl std::error::Error for CommandError {}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(word, rest)| (word, rest.trim()));

        let required = |command: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument { command })
            } else {
                Ok(rest.to_string())
            }
        };

        match word {
            "" => Err(CommandError::Empty),
            "login" => required("login").map(Command::Login),
            "logout" => Ok(Command::Logout),
            "lessons" | "ls" => Ok(Command::Lessons),
            "start" => {
                let raw = required("start")?;
                raw.parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .map(Command::Start)
                    .ok_or(CommandError::InvalidLessonNumber { raw })
            }
            "prev-lesson" => Ok(Command::PrevLesson),
            "next-lesson" => Ok(Command::NextLesson),
            "home" => Ok(Command::Home),
            // Answers keep their inner spacing; only the ends are trimmed.
            "answer" | "a" => Ok(Command::Answer(rest.to_string())),
            "next" | "n" => Ok(Command::Next),
            "reveal" => Ok(Command::Reveal),
            "confirm" => Ok(Command::Confirm),
            "cancel" => Ok(Command::Cancel),
            "advance" => Ok(Command::Advance),
            "stay" => Ok(Command::Stay),
            "review" => Ok(Command::Review),
            "review-answer" | "ra" => Ok(Command::ReviewAnswer(rest.to_string())),
            "review-reveal" => Ok(Command::ReviewReveal),
            "close" => Ok(Command::Close),
            "status" | "s" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

const UNLOCK_PROMPT: &str = "\nStreak reached! Unlock the next lesson? (`advance` / `stay`)";

const HELP: &str = "\
Commands:
  login <name>          sign in (or register) as <name>
  logout                forget the current user
  lessons               list lessons
  start <n>             practice lesson number <n>
  prev-lesson           select the previous lesson
  next-lesson           select the next lesson
  home                  leave practice
  answer <text>         check an answer for the current problem
  next                  skip to the next problem
  reveal / confirm      show the answer (confirm required; the problem stops counting)
  cancel                keep the answer hidden
  advance / stay        accept or decline the next-lesson unlock
  review                start a review now
  review-answer <text>  answer the open review
  review-reveal         show the review answer
  close                 close the review
  status                show where you are
  quit";

/// Read commands from stdin until `quit` or end of input.
pub async fn run(services: &AppServices) -> Result<(), std::io::Error> {
    let notifier = spawn_review_notifier(services);
    println!("{}", status(services));
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        println!("{}", execute(services, command).await);
    }

    notifier.abort();
    Ok(())
}

/// Run one command and describe the outcome.
pub async fn execute(services: &AppServices, command: Command) -> String {
    let practice = services.practice();
    let review = services.review();
    let lessons = services.lessons();

    match command {
        Command::Login(name) => {
            services.auth().open_login();
            match services.login().login_with_username(&name).await {
                Ok(user) => format!("Signed in as {}.\n{}", user.username, status(services)),
                Err(err) => format!("Login failed: {err}"),
            }
        }
        Command::Logout => {
            services.go_home();
            services.auth().logout(false);
            "Signed out. Use `login <name>` to continue.".to_string()
        }
        Command::Lessons => render_lessons(&lessons.snapshot(), services.auth().user().as_ref()),
        Command::Start(index) => match services.open_lesson(index).await {
            Ok(_) => render_practice(&practice.snapshot()),
            Err(err) => err.to_string(),
        },
        Command::PrevLesson | Command::NextLesson => {
            let moved = if command == Command::PrevLesson {
                lessons.previous_lesson().await
            } else {
                lessons.next_lesson().await
            };
            match moved {
                Ok(Some(lesson_id)) if lessons.view() == View::Practice => {
                    match practice.load_problems_for_lesson(lesson_id).await {
                        Ok(_) => render_practice(&practice.snapshot()),
                        Err(err) => err.to_string(),
                    }
                }
                Ok(Some(_)) => render_lesson_header(&lessons.snapshot()),
                Ok(None) => "No lesson in that direction.".to_string(),
                Err(err) => err.to_string(),
            }
        }
        Command::Home => {
            services.go_home();
            render_lessons(&lessons.snapshot(), services.auth().user().as_ref())
        }
        Command::Answer(text) => match practice.submit_answer(&text).await {
            Some(feedback) => render_feedback(&feedback, &practice.snapshot()),
            None if services.shell().mode().is_login() => "Sign in first (`login <name>`).".to_string(),
            None => "The problem changed before the answer was checked.".to_string(),
        },
        Command::Next => {
            practice.next_problem();
            render_practice(&practice.snapshot())
        }
        Command::Reveal => {
            if practice.reveal_current() {
                "Reveal the answer? It will no longer count toward your streak. (`confirm` / `cancel`)"
                    .to_string()
            } else {
                "No problem selected.".to_string()
            }
        }
        Command::Confirm => match practice.confirm_reveal() {
            Some(feedback) => feedback.to_string(),
            None => "Nothing to confirm.".to_string(),
        },
        Command::Cancel => {
            practice.cancel_reveal();
            "Answer stays hidden.".to_string()
        }
        Command::Advance => match practice.confirm_lesson_advance().await {
            Some(feedback) => format!("{feedback}\n{}", render_practice(&practice.snapshot())),
            None => "No lesson unlock is pending.".to_string(),
        },
        Command::Stay => {
            practice.reset_streak_and_dismiss();
            "Staying on this lesson; streak reset.".to_string()
        }
        Command::Review => match review.trigger_manual_review().await {
            Ok(ManualReview::Opened(_)) => render_review(&review.snapshot()),
            Ok(ManualReview::LoginRequired) => "Sign in first (`login <name>`).".to_string(),
            Err(err) => err.to_string(),
        },
        Command::ReviewAnswer(text) => match review.submit_review_answer(&text).await {
            Some(feedback) => feedback.to_string(),
            None => "No review is waiting for an answer.".to_string(),
        },
        Command::ReviewReveal => match review.reveal_review_answer() {
            Some(feedback) => feedback.to_string(),
            None => "No review is open.".to_string(),
        },
        Command::Close => {
            if review.is_open() {
                review.close_review();
                "Review closed.".to_string()
            } else {
                "No review is open.".to_string()
            }
        }
        Command::Status => status(services),
        Command::Help => HELP.to_string(),
        Command::Quit => String::new(),
    }
}

/// Print due reviews as they pop up from the background ticker.
fn spawn_review_notifier(services: &AppServices) -> JoinHandle<()> {
    let mut changes = services.shell().subscribe();
    let review = services.review();
    tokio::spawn(async move {
        let mut was_open = changes.borrow().mode.is_review();
        while changes.changed().await.is_ok() {
            let open = changes.borrow_and_update().mode.is_review();
            if open && !was_open {
                println!("\n{}", render_review(&review.snapshot()));
            } else if !open && was_open {
                println!("\nReview closed.");
            }
            was_open = open;
        }
    })
}

fn status(services: &AppServices) -> String {
    let shell = services.shell().snapshot();
    let mut out = match &shell.username {
        Some(name) => format!("User: {name}"),
        None => "Not signed in.".to_string(),
    };
    if shell.mode.is_login() {
        out.push_str("\nLogin required: `login <name>`.");
        if let Some(error) = services.auth().login_error() {
            let _ = write!(out, " ({error})");
        }
    }
    let lessons = services.lessons().snapshot();
    if let Some(error) = &lessons.error {
        let _ = write!(out, "\n{error}");
    }
    out.push('\n');
    out.push_str(&render_lesson_header(&lessons));
    if shell.mode.is_review() {
        out.push('\n');
        out.push_str(&render_review(&services.review().snapshot()));
    } else if shell.mode.view() == View::Practice {
        out.push('\n');
        out.push_str(&render_practice(&services.practice().snapshot()));
    }
    out
}

fn render_lesson_header(snapshot: &LessonSnapshot) -> String {
    match &snapshot.current {
        Some(lesson) => {
            let mut out = format!("Lesson {}: {}", lesson.id, lesson.title);
            if !snapshot.body.is_empty() {
                let _ = write!(out, "\n{}", snapshot.body);
            }
            out
        }
        None => "No lesson selected.".to_string(),
    }
}

pub fn render_lessons(snapshot: &LessonSnapshot, user: Option<&User>) -> String {
    if snapshot.lessons.is_empty() {
        return "No lessons found.".to_string();
    }
    let mut out = String::new();
    for (position, lesson) in snapshot.lessons.iter().enumerate() {
        let marker = if snapshot.index == Some(position) { '>' } else { ' ' };
        let locked = !navigation::has_access(user, lesson.id);
        let _ = write!(out, "{marker} {:>2}. {}", position + 1, lesson.title);
        if let (Some(count), Some(minutes)) = (lesson.problem_count, lesson.estimated_minutes) {
            let _ = write!(out, " ({count} problems, ~{minutes} min)");
        }
        if locked {
            out.push_str(" [locked]");
        }
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out
}

pub fn render_practice(snapshot: &PracticeSnapshot) -> String {
    let Some(problem) = &snapshot.problem else {
        return "No problems in this lesson.".to_string();
    };
    let mut out = format!(
        "Problem {}/{} (streak {})\n{}",
        snapshot.index + 1,
        snapshot.total,
        snapshot.streak,
        problem.prompt_text
    );
    if snapshot.is_revealed {
        out.push_str("\n(revealed)");
    }
    if snapshot.unlock_proposed {
        out.push_str(UNLOCK_PROMPT);
    }
    out
}

fn render_feedback(feedback: &Feedback, snapshot: &PracticeSnapshot) -> String {
    let mut out = feedback.to_string();
    if snapshot.unlock_proposed {
        out.push_str(UNLOCK_PROMPT);
    } else if snapshot.advance_pending {
        out.push_str("\nMoving on shortly...");
    }
    out
}

pub fn render_review(snapshot: &ReviewSnapshot) -> String {
    match &snapshot.problem {
        Some(problem) => format!(
            "Review time! Lesson {}\n{}\nAnswer with `review-answer <text>`.",
            problem.lesson_id, problem.prompt_text
        ),
        None => "No review is open.".to_string(),
    }
}
