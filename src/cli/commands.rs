use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pithy")]
#[command(about = "Multi-tenant feed aggregator with a polling refresh engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the refresh scheduler until interrupted (Ctrl-C)
    Serve,

    /// Run one refresh cycle and print the result for each feed
    Refresh,

    /// Create a user
    UserAdd {
        /// User name
        name: String,
    },

    /// Subscribe a user to a feed URL
    Subscribe {
        /// User name
        #[arg(short, long)]
        user: String,

        /// Feed URL (http or https)
        url: String,
    },

    /// Remove one of a user's subscriptions
    Unsubscribe {
        /// User name
        #[arg(short, long)]
        user: String,

        /// Feed id as shown by `feeds`
        feed_id: i64,
    },

    /// List a user's subscriptions
    Feeds {
        /// User name
        #[arg(short, long)]
        user: String,
    },

    /// List a user's unread items, oldest first
    Unread {
        /// User name
        #[arg(short, long)]
        user: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Mark items as read
    MarkRead {
        /// User name
        #[arg(short, long)]
        user: String,

        /// Item ids as shown by `unread`
        #[arg(required = true)]
        item_ids: Vec<i64>,
    },

    /// Mark every unread item as read
    MarkAllRead {
        /// User name
        #[arg(short, long)]
        user: String,
    },
}
