#[macro_use]
extern crate prettytable;
use prettytable::Table;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use diesel::sqlite::SqliteConnection;
use failure::{format_err, Error};

use blogging::auth::hash_password;
use blogging::config::DEFAULT_DATABASE_URL;
use blogging::db;

use std::env;
use std::process::exit;

const EMPTY: &str = "-empty-";

fn main() {
    let matches = App::new("blog-ctl")
        .about("Administers the blogging database")
        .arg(Arg::with_name("url")
             .short("u")
             .long("url")
             .help("Specify the SQLite database URL")
             .takes_value(true))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(SubCommand::with_name("migrate")
                    .about("Applies pending migrations"))
        .subcommand(SubCommand::with_name("list-groups")
                    .about("Lists groups in the database"))
        .subcommand(SubCommand::with_name("create-group")
                    .about("Creates a group")
                    .arg(Arg::with_name("title")
                         .short("t")
                         .long("title")
                         .takes_value(true)
                         .required(true))
                    .arg(Arg::with_name("slug")
                         .short("s")
                         .long("slug")
                         .takes_value(true)
                         .required(true))
                    .arg(Arg::with_name("description")
                         .short("d")
                         .long("description")
                         .takes_value(true)))
        .subcommand(SubCommand::with_name("delete-group")
                    .about("Deletes a group; its posts are kept without a group")
                    .arg(Arg::with_name("slug")
                         .short("s")
                         .long("slug")
                         .takes_value(true)
                         .required(true)))
        .subcommand(SubCommand::with_name("list-posts")
                    .about("Lists posts, newest first")
                    .arg(Arg::with_name("group")
                         .short("g")
                         .long("group")
                         .help("Only posts in the group with this slug")
                         .takes_value(true)))
        .subcommand(SubCommand::with_name("create-user")
                    .about("Creates a user")
                    .arg(Arg::with_name("username")
                         .long("username")
                         .takes_value(true)
                         .required(true))
                    .arg(Arg::with_name("password")
                         .long("password")
                         .takes_value(true)
                         .required(true)))
        .subcommand(SubCommand::with_name("list-follows")
                    .about("Lists who follows whom"))
        .subcommand(SubCommand::with_name("purge-sessions")
                    .about("Deletes expired login sessions"))
        .get_matches();

    let _ = dotenv::dotenv();

    let db_url = match matches.value_of("url") {
        Some(url) => url.to_string(),
        None => env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
    };

    let mut conn = match db::establish(&db_url) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        },
    };

    if let Err(e) = run(&mut conn, &matches) {
        eprintln!("Error: {}", e);
        exit(1);
    }
}

fn run(conn: &mut SqliteConnection, matches: &ArgMatches) -> Result<(), Error> {
    match matches.subcommand() {
        ("migrate", _) => {
            let applied = db::run_migrations(conn)?;
            println!("Applied {} migrations", applied);
        },
        ("list-groups", _) => {
            let mut table = Table::new();
            table.add_row(row!["ID", "Title", "Slug", "Description"]);
            for group in db::list_groups(conn)? {
                let desc = if group.description.is_empty() { EMPTY.to_string() } else { group.description };
                table.add_row(row![group.id.to_string(), group.title, group.slug, desc]);
            }
            table.printstd();
        },
        ("create-group", Some(args)) => {
            let title = required(args, "title")?;
            let slug = required(args, "slug")?;
            let description = args.value_of("description").unwrap_or("");
            let id = db::create_group(conn, title, slug, description)?;
            println!("Created group {} ({})", slug, id);
        },
        ("delete-group", Some(args)) => {
            let slug = required(args, "slug")?;
            match db::delete_group(conn, slug)? {
                Some(detached) => println!("Deleted group {}; {} posts kept without a group", slug, detached),
                None => return Err(format_err!("no group with slug {}", slug)),
            }
        },
        ("list-posts", Some(args)) => {
            let mut table = Table::new();
            table.add_row(row!["ID", "Text", "Published", "Author", "Group"]);
            for (post, author, group) in db::admin_posts(conn, args.value_of("group"))? {
                table.add_row(row![
                    post.id.to_string(),
                    post.to_string(),
                    post.pub_date.format("%Y-%m-%d %H:%M").to_string(),
                    author,
                    group.unwrap_or_else(|| EMPTY.to_string())
                ]);
            }
            table.printstd();
        },
        ("create-user", Some(args)) => {
            let username = required(args, "username")?;
            if let Err(reason) = blogging::forms::check_username(username) {
                return Err(format_err!("cannot use username {}: {}", username, reason));
            }
            let hash = hash_password(required(args, "password")?)?;
            match db::create_user(conn, username, &hash)? {
                Some(id) => println!("Created user {} ({})", username, id),
                None => return Err(format_err!("user {} already exists", username)),
            }
        },
        ("list-follows", _) => {
            let mut table = Table::new();
            table.add_row(row!["User", "Author"]);
            for (user, author) in db::list_follows(conn)? {
                table.add_row(row![user, author]);
            }
            table.printstd();
        },
        ("purge-sessions", _) => {
            let purged = db::purge_sessions(conn)?;
            println!("Deleted {} expired sessions", purged);
        },
        _ => unreachable!(),
    }

    Ok(())
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str, Error> {
    args.value_of(name).ok_or_else(|| format_err!("missing --{}", name))
}
