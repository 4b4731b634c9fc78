use std::sync::Arc;

use anyhow::Context;
use cinebook_catalog::{build_layout, parse_grid, PricingEngine};
use cinebook_core::{
    BookingService, Clock, LogNotifier, SeatInventory, SeatStatusChannel, SystemClock,
};
use cinebook_shared::{FoodItem, ShowtimeSelection, TicketType};
use cinebook_sheet::{BookingSheet, SheetServices};
use cinebook_store::{
    open_session_store, MemoryBookingService, MemoryInventory, MemoryShowtimeCatalog, PriceList,
    RedisBookingService, RedisClient, RedisSeatChannel, RedisSeatInventory, SeatStatusHub,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const DEMO_ROOM: &str = "NNNNNN\nNN..NN\nCC..CC\nVVVVVV";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinebook=info,cinebook_sheet=debug,cinebook_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cinebook_store::app_config::Config::load().context("Failed to load config")?;
    let holder = std::env::var("CINEBOOK_HOLDER").unwrap_or_else(|_| Uuid::new_v4().to_string());
    tracing::info!("Starting booking sheet for {} ({:?} sessions)", holder, config.session.backend);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Room, showtime and menu
    let layout = build_layout(Uuid::new_v4(), &parse_grid(DEMO_ROOM)?)?;
    let showtime = ShowtimeSelection {
        id: Uuid::new_v4(),
        room_id: layout.room_id,
        base_price: 9000,
        vip_surcharge: 2000,
        couple_surcharge: 1500,
    };
    let popcorn = FoodItem { id: Uuid::new_v4(), name: "Popcorn".to_string(), price: 4500 };
    let menu = vec![popcorn.clone(), FoodItem { id: Uuid::new_v4(), name: "Soda".to_string(), price: 2500 }];

    let catalog = MemoryShowtimeCatalog::new();
    catalog.add_room(layout.clone()).await;
    catalog.set_menu(menu.clone()).await;

    let prices = PriceList::default();
    prices.register(showtime.id, PricingEngine::new(&showtime, &menu)).await;

    // Redis Connection, optional
    let redis = match &config.redis {
        Some(redis) => Some(RedisClient::new(&redis.url).await.context("Failed to connect to Redis")?),
        None => None,
    };
    let sessions = open_session_store(&config.session, redis.clone(), clock.clone())?;

    let inventory: Arc<dyn SeatInventory>;
    let bookings: Arc<dyn BookingService>;
    let channel: Arc<dyn SeatStatusChannel>;
    let mut sweeper = None;
    match redis {
        Some(redis) => {
            inventory = Arc::new(RedisSeatInventory::new(
                redis.clone(),
                &holder,
                config.booking.seat_lock_seconds,
                clock.clone(),
            ));
            bookings = Arc::new(RedisBookingService::new(redis.clone(), &holder, prices));
            channel = Arc::new(RedisSeatChannel::new(redis));
        }
        None => {
            let board = MemoryInventory::new(config.booking.seat_lock_duration(), SeatStatusHub::default(), clock.clone());
            inventory = Arc::new(board.session(&holder));
            bookings = Arc::new(MemoryBookingService::new(board.clone(), &holder).with_prices(prices));
            channel = Arc::new(board.hub().clone());
            // Redis expires locks itself; the local board needs a sweep
            sweeper = Some(board.spawn_sweeper(config.booking.tick_interval()));
        }
    }

    let sheet = BookingSheet::open(
        SheetServices {
            inventory,
            catalog: Arc::new(catalog),
            bookings,
            sessions,
            channel,
            notifier: Arc::new(LogNotifier),
            clock,
        },
        config.booking.clone(),
    );

    sheet.select_showtime(showtime).await?;
    sheet.update_quantity(TicketType::Standard, 2).await?;
    sheet.update_quantity(TicketType::Couple, 1).await?;
    sheet.update_food(popcorn.id, 1).await?;

    for label in ["A3", "A4", "C1"] {
        let seat = layout
            .seat_by_label(label)
            .with_context(|| format!("Demo room has no seat {}", label))?;
        let outcome = sheet.toggle_seat(seat.id, None).await?;
        tracing::info!("Toggled {} -> {:?}", label, outcome);
    }

    print!("{}", sheet.render().await?);
    if let Some(snapshot) = sheet.snapshot().await {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    match sheet.checkout().await {
        Ok(confirmation) => {
            tracing::info!("Booking {} awaiting payment ({})", confirmation.id, confirmation.total_price);
            sheet.confirm_payment().await?;
            print!("{}", sheet.render().await?);
        }
        Err(e) => tracing::warn!("Checkout failed: {}", e),
    }

    sheet.close().await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    Ok(())
}
