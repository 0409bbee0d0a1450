use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Booking, BookingDetails, BookingStatus, Cottage, GuestDetails, Package, Payment,
    PaymentRecordStatus, PaymentStatus, SafariBooking, SafariBookingDetails, SafariType,
};

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, DATE_FMT).unwrap_or_else(|_| Utc::now().date_naive())
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_string_list(json: Option<String>) -> Vec<String> {
    json.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

// ── Cottages ──

const COTTAGE_COLS: &str = "id, name, type, description, base_price, max_guests, amenities, is_active";

fn parse_cottage_row(row: &rusqlite::Row) -> rusqlite::Result<Cottage> {
    let amenities_json: Option<String> = row.get(6)?;
    Ok(Cottage {
        id: row.get(0)?,
        name: row.get(1)?,
        cottage_type: row.get(2)?,
        description: row.get(3)?,
        base_price: row.get(4)?,
        max_guests: row.get(5)?,
        amenities: parse_string_list(amenities_json),
        is_active: row.get::<_, i64>(7)? != 0,
    })
}

pub fn list_active_cottages(conn: &Connection) -> anyhow::Result<Vec<Cottage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COTTAGE_COLS} FROM cottages WHERE is_active = 1 ORDER BY base_price ASC"
    ))?;
    let rows = stmt.query_map([], parse_cottage_row)?;

    let mut cottages = vec![];
    for row in rows {
        cottages.push(row?);
    }
    Ok(cottages)
}

pub fn get_cottage_by_type(conn: &Connection, cottage_type: &str) -> anyhow::Result<Option<Cottage>> {
    let result = conn.query_row(
        &format!("SELECT {COTTAGE_COLS} FROM cottages WHERE type = ?1 AND is_active = 1"),
        params![cottage_type],
        parse_cottage_row,
    );

    match result {
        Ok(cottage) => Ok(Some(cottage)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_cottage_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Cottage>> {
    let result = conn.query_row(
        &format!("SELECT {COTTAGE_COLS} FROM cottages WHERE id = ?1"),
        params![id],
        parse_cottage_row,
    );

    match result {
        Ok(cottage) => Ok(Some(cottage)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_cottage(conn: &Connection, cottage: &Cottage) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO cottages (id, name, type, description, base_price, max_guests, amenities, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            cottage.id,
            cottage.name,
            cottage.cottage_type,
            cottage.description,
            cottage.base_price,
            cottage.max_guests,
            serde_json::to_string(&cottage.amenities)?,
            cottage.is_active as i64,
        ],
    )?;
    Ok(())
}

pub fn update_cottage(conn: &Connection, cottage: &Cottage) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE cottages
         SET name = ?1, type = ?2, description = ?3, base_price = ?4, max_guests = ?5,
             amenities = ?6, is_active = ?7, updated_at = datetime('now')
         WHERE id = ?8",
        params![
            cottage.name,
            cottage.cottage_type,
            cottage.description,
            cottage.base_price,
            cottage.max_guests,
            serde_json::to_string(&cottage.amenities)?,
            cottage.is_active as i64,
            cottage.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn update_cottage_price(conn: &Connection, id: &str, base_price: f64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE cottages SET base_price = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![base_price, id],
    )?;
    Ok(count > 0)
}

/// Cottages are never hard-deleted while bookings reference them; delete
/// is modeled as deactivation.
pub fn deactivate_cottage(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE cottages SET is_active = 0, updated_at = datetime('now') WHERE id = ?1",
        params![id],
    )?;
    Ok(count > 0)
}

// ── Packages ──

const PACKAGE_COLS: &str =
    "id, name, description, price_multiplier, includes_safari, max_safaris, is_active";

fn parse_package_row(row: &rusqlite::Row) -> rusqlite::Result<Package> {
    Ok(Package {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price_multiplier: row.get(3)?,
        includes_safari: row.get::<_, i64>(4)? != 0,
        max_safaris: row.get(5)?,
        is_active: row.get::<_, i64>(6)? != 0,
    })
}

pub fn list_active_packages(conn: &Connection) -> anyhow::Result<Vec<Package>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PACKAGE_COLS} FROM packages WHERE is_active = 1 ORDER BY price_multiplier ASC"
    ))?;
    let rows = stmt.query_map([], parse_package_row)?;

    let mut packages = vec![];
    for row in rows {
        packages.push(row?);
    }
    Ok(packages)
}

pub fn get_package(conn: &Connection, id: &str) -> anyhow::Result<Option<Package>> {
    let result = conn.query_row(
        &format!("SELECT {PACKAGE_COLS} FROM packages WHERE id = ?1 AND is_active = 1"),
        params![id],
        parse_package_row,
    );

    match result {
        Ok(package) => Ok(Some(package)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_package(conn: &Connection, package: &Package) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO packages (id, name, description, price_multiplier, includes_safari, max_safaris, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            package.id,
            package.name,
            package.description,
            package.price_multiplier,
            package.includes_safari as i64,
            package.max_safaris,
            package.is_active as i64,
        ],
    )?;
    Ok(())
}

pub fn update_package(conn: &Connection, package: &Package) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE packages
         SET name = ?1, description = ?2, price_multiplier = ?3, includes_safari = ?4,
             max_safaris = ?5, is_active = ?6, updated_at = datetime('now')
         WHERE id = ?7",
        params![
            package.name,
            package.description,
            package.price_multiplier,
            package.includes_safari as i64,
            package.max_safaris,
            package.is_active as i64,
            package.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn count_bookings_for_package(conn: &Connection, package_id: &str) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE package_id = ?1",
        params![package_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn delete_package(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM packages WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Safari types ──

const SAFARI_COLS: &str =
    "id, name, description, price, duration, max_guests, time_slots, is_active";

fn parse_safari_type_row(row: &rusqlite::Row) -> rusqlite::Result<SafariType> {
    let slots_json: Option<String> = row.get(6)?;
    Ok(SafariType {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        duration: row.get(4)?,
        max_guests: row.get(5)?,
        time_slots: parse_string_list(slots_json),
        is_active: row.get::<_, i64>(7)? != 0,
    })
}

pub fn list_active_safari_types(conn: &Connection) -> anyhow::Result<Vec<SafariType>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SAFARI_COLS} FROM safari_types WHERE is_active = 1 ORDER BY price ASC"
    ))?;
    let rows = stmt.query_map([], parse_safari_type_row)?;

    let mut safaris = vec![];
    for row in rows {
        safaris.push(row?);
    }
    Ok(safaris)
}

pub fn get_safari_type(conn: &Connection, id: &str) -> anyhow::Result<Option<SafariType>> {
    let result = conn.query_row(
        &format!("SELECT {SAFARI_COLS} FROM safari_types WHERE id = ?1 AND is_active = 1"),
        params![id],
        parse_safari_type_row,
    );

    match result {
        Ok(safari) => Ok(Some(safari)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_safari_type(conn: &Connection, safari: &SafariType) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO safari_types (id, name, description, price, duration, max_guests, time_slots, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            safari.id,
            safari.name,
            safari.description,
            safari.price,
            safari.duration,
            safari.max_guests,
            serde_json::to_string(&safari.time_slots)?,
            safari.is_active as i64,
        ],
    )?;
    Ok(())
}

pub fn update_safari_type(conn: &Connection, safari: &SafariType) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE safari_types
         SET name = ?1, description = ?2, price = ?3, duration = ?4, max_guests = ?5,
             time_slots = ?6, is_active = ?7, updated_at = datetime('now')
         WHERE id = ?8",
        params![
            safari.name,
            safari.description,
            safari.price,
            safari.duration,
            safari.max_guests,
            serde_json::to_string(&safari.time_slots)?,
            safari.is_active as i64,
            safari.id,
        ],
    )?;
    Ok(count > 0)
}

/// Participants already committed for one (safari type, date, slot) bucket.
pub fn sum_safari_participants(
    conn: &Connection,
    safari_type_id: &str,
    date: NaiveDate,
    time_slot: &str,
) -> anyhow::Result<i64> {
    let sum: i64 = conn.query_row(
        "SELECT COALESCE(SUM(participants), 0) FROM safari_bookings
         WHERE safari_type_id = ?1 AND date = ?2 AND time_slot = ?3",
        params![safari_type_id, date.format(DATE_FMT).to_string(), time_slot],
        |row| row.get(0),
    )?;
    Ok(sum)
}

// ── Bookings ──

const BOOKING_COLS: &str = "id, booking_reference, cottage_id, package_id, check_in_date, \
     check_out_date, adults, children, total_amount, status, payment_status, payment_method, \
     special_requests, guest_details, admin_notes, created_at, updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let check_in: String = row.get(4)?;
    let check_out: String = row.get(5)?;
    let status: String = row.get(9)?;
    let payment_status: String = row.get(10)?;
    let guest_json: String = row.get(13)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    let guest_details: GuestDetails =
        serde_json::from_str(&guest_json).unwrap_or(GuestDetails {
            name: String::new(),
            email: String::new(),
            phone: None,
        });

    Ok(Booking {
        id: row.get(0)?,
        booking_reference: row.get(1)?,
        cottage_id: row.get(2)?,
        package_id: row.get(3)?,
        check_in_date: parse_date(&check_in),
        check_out_date: parse_date(&check_out),
        adults: row.get(6)?,
        children: row.get(7)?,
        total_amount: row.get(8)?,
        status: BookingStatus::parse(&status),
        payment_status: PaymentStatus::parse(&payment_status),
        payment_method: row.get(11)?,
        special_requests: row.get(12)?,
        guest_details,
        admin_notes: row.get(14)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!("INSERT INTO bookings ({BOOKING_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"),
        params![
            booking.id,
            booking.booking_reference,
            booking.cottage_id,
            booking.package_id,
            booking.check_in_date.format(DATE_FMT).to_string(),
            booking.check_out_date.format(DATE_FMT).to_string(),
            booking.adults,
            booking.children,
            booking.total_amount,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.payment_method,
            booking.special_requests,
            serde_json::to_string(&booking.guest_details)?,
            booking.admin_notes,
            booking.created_at.format(DATETIME_FMT).to_string(),
            booking.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

/// Active (pending/confirmed) bookings whose half-open [check_in, check_out)
/// range intersects the given one. Back-to-back stays never match.
pub fn find_overlapping_bookings(
    conn: &Connection,
    cottage_id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE cottage_id = ?1
           AND status IN ('pending', 'confirmed')
           AND check_in_date < ?2
           AND check_out_date > ?3
         ORDER BY check_in_date ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            cottage_id,
            check_out.format(DATE_FMT).to_string(),
            check_in.format(DATE_FMT).to_string(),
        ],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Blocking bookings whose half-open range intersects [start, end), for
/// the calendar view. Same overlap rule as the conflict query; a booking
/// checking out on `start` is not in the window.
pub fn bookings_in_window(
    conn: &Connection,
    cottage_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLS} FROM bookings
         WHERE cottage_id = ?1
           AND status IN ('pending', 'confirmed')
           AND check_in_date < ?2
           AND check_out_date > ?3
         ORDER BY check_in_date ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            cottage_id,
            end.format(DATE_FMT).to_string(),
            start.format(DATE_FMT).to_string(),
        ],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn booking_reference_exists(conn: &Connection, reference: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE booking_reference = ?1",
        params![reference],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn booking_details_for(conn: &Connection, booking: Booking) -> anyhow::Result<BookingDetails> {
    let (cottage_name, cottage_type): (String, String) = conn.query_row(
        "SELECT name, type FROM cottages WHERE id = ?1",
        params![booking.cottage_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let package_name = match &booking.package_id {
        Some(package_id) => conn
            .query_row(
                "SELECT name FROM packages WHERE id = ?1",
                params![package_id],
                |row| row.get(0),
            )
            .ok(),
        None => None,
    };

    Ok(BookingDetails {
        booking,
        cottage_name,
        cottage_type,
        package_name,
    })
}

pub fn get_booking_details(conn: &Connection, id: &str) -> anyhow::Result<Option<BookingDetails>> {
    match get_booking_by_id(conn, id)? {
        Some(booking) => Ok(Some(booking_details_for(conn, booking)?)),
        None => Ok(None),
    }
}

pub fn get_booking_details_by_reference(
    conn: &Connection,
    reference: &str,
) -> anyhow::Result<Option<BookingDetails>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLS} FROM bookings WHERE booking_reference = ?1"),
        params![reference],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking_details_for(conn, booking?)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    admin_notes: Option<&str>,
) -> anyhow::Result<bool> {
    let count = match admin_notes {
        Some(notes) => conn.execute(
            "UPDATE bookings SET status = ?1, admin_notes = ?2, updated_at = datetime('now') WHERE id = ?3",
            params![status.as_str(), notes, id],
        )?,
        None => conn.execute(
            "UPDATE bookings SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![status.as_str(), id],
        )?,
    };
    Ok(count > 0)
}

pub fn update_payment_status(
    conn: &Connection,
    id: &str,
    payment_status: PaymentStatus,
    payment_method: Option<&str>,
) -> anyhow::Result<bool> {
    let count = match payment_method {
        Some(method) => conn.execute(
            "UPDATE bookings SET payment_status = ?1, payment_method = ?2, updated_at = datetime('now') WHERE id = ?3",
            params![payment_status.as_str(), method, id],
        )?,
        None => conn.execute(
            "UPDATE bookings SET payment_status = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![payment_status.as_str(), id],
        )?,
    };
    Ok(count > 0)
}

// ── Safari bookings ──

pub fn insert_safari_booking(conn: &Connection, row: &SafariBooking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO safari_bookings (id, booking_id, safari_type_id, participants, date, time_slot)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.id,
            row.booking_id,
            row.safari_type_id,
            row.participants,
            row.date.format(DATE_FMT).to_string(),
            row.time_slot,
        ],
    )?;
    Ok(())
}

pub fn get_safari_bookings(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<SafariBookingDetails>> {
    let mut stmt = conn.prepare(
        "SELECT sb.id, sb.booking_id, sb.safari_type_id, sb.participants, sb.date, sb.time_slot,
                st.name, st.price
         FROM safari_bookings sb
         JOIN safari_types st ON sb.safari_type_id = st.id
         WHERE sb.booking_id = ?1
         ORDER BY sb.date ASC, sb.time_slot ASC",
    )?;

    let rows = stmt.query_map(params![booking_id], |row| {
        let date: String = row.get(4)?;
        Ok(SafariBookingDetails {
            safari_booking: SafariBooking {
                id: row.get(0)?,
                booking_id: row.get(1)?,
                safari_type_id: row.get(2)?,
                participants: row.get(3)?,
                date: parse_date(&date),
                time_slot: row.get(5)?,
            },
            safari_name: row.get(6)?,
            price: row.get(7)?,
        })
    })?;

    let mut safaris = vec![];
    for row in rows {
        safaris.push(row?);
    }
    Ok(safaris)
}

// ── Admin booking list / stats ──

#[derive(Debug, Default)]
pub struct BookingFilter {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub cottage_type: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

fn filter_clauses(filter: &BookingFilter) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
    let mut conditions: Vec<&str> = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(status) = &filter.status {
        conditions.push("b.status = ?");
        params_vec.push(Box::new(status.clone()));
    }
    if let Some(payment_status) = &filter.payment_status {
        conditions.push("b.payment_status = ?");
        params_vec.push(Box::new(payment_status.clone()));
    }
    if let Some(from) = &filter.date_from {
        conditions.push("b.check_in_date >= ?");
        params_vec.push(Box::new(from.format(DATE_FMT).to_string()));
    }
    if let Some(to) = &filter.date_to {
        conditions.push("b.check_in_date <= ?");
        params_vec.push(Box::new(to.format(DATE_FMT).to_string()));
    }
    if let Some(cottage_type) = &filter.cottage_type {
        conditions.push("c.type = ?");
        params_vec.push(Box::new(cottage_type.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, params_vec)
}

pub fn list_bookings(
    conn: &Connection,
    filter: &BookingFilter,
) -> anyhow::Result<(Vec<BookingDetails>, i64)> {
    let (where_clause, mut params_vec) = filter_clauses(filter);

    let total: i64 = {
        let sql = format!(
            "SELECT COUNT(*) FROM bookings b JOIN cottages c ON b.cottage_id = c.id {where_clause}"
        );
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?
    };

    params_vec.push(Box::new(filter.limit));
    params_vec.push(Box::new(filter.offset));

    let sql = format!(
        "SELECT b.id, b.booking_reference, b.cottage_id, b.package_id, b.check_in_date,
                b.check_out_date, b.adults, b.children, b.total_amount, b.status,
                b.payment_status, b.payment_method, b.special_requests, b.guest_details,
                b.admin_notes, b.created_at, b.updated_at, c.name, c.type, p.name
         FROM bookings b
         JOIN cottages c ON b.cottage_id = c.id
         LEFT JOIN packages p ON b.package_id = p.id
         {where_clause}
         ORDER BY b.created_at DESC
         LIMIT ? OFFSET ?"
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        let booking = parse_booking_row(row);
        let cottage_name: String = row.get(17)?;
        let cottage_type: String = row.get(18)?;
        let package_name: Option<String> = row.get(19)?;
        Ok((booking, cottage_name, cottage_type, package_name))
    })?;

    let mut bookings = vec![];
    for row in rows {
        let (booking, cottage_name, cottage_type, package_name) = row?;
        bookings.push(BookingDetails {
            booking: booking?,
            cottage_name,
            cottage_type,
            package_name,
        });
    }
    Ok((bookings, total))
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStats {
    pub total_bookings: i64,
    pub confirmed_bookings: i64,
    pub pending_bookings: i64,
    pub cancelled_bookings: i64,
    pub paid_bookings: i64,
    pub total_revenue: f64,
}

/// Aggregates over the trailing 30 days, for the admin dashboard.
pub fn booking_stats(conn: &Connection) -> anyhow::Result<BookingStats> {
    conn.query_row(
        "SELECT
            COUNT(*),
            COUNT(CASE WHEN status = 'confirmed' THEN 1 END),
            COUNT(CASE WHEN status = 'pending' THEN 1 END),
            COUNT(CASE WHEN status = 'cancelled' THEN 1 END),
            COUNT(CASE WHEN payment_status = 'paid' THEN 1 END),
            COALESCE(SUM(CASE WHEN payment_status = 'paid' THEN total_amount ELSE 0 END), 0)
         FROM bookings
         WHERE created_at >= datetime('now', '-30 days')",
        [],
        |row| {
            Ok(BookingStats {
                total_bookings: row.get(0)?,
                confirmed_bookings: row.get(1)?,
                pending_bookings: row.get(2)?,
                cancelled_bookings: row.get(3)?,
                paid_bookings: row.get(4)?,
                total_revenue: row.get(5)?,
            })
        },
    )
    .map_err(Into::into)
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenuePeriod {
    pub period: String,
    pub total_bookings: i64,
    pub revenue: f64,
    pub avg_booking_value: f64,
}

/// Confirmed-booking revenue grouped by a strftime bucket ("%Y-%m-%d",
/// "%Y-%m" or "%Y"), optionally bounded by creation date.
pub fn revenue_report(
    conn: &Connection,
    bucket_fmt: &str,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> anyhow::Result<Vec<RevenuePeriod>> {
    let mut conditions = vec!["status = 'confirmed'".to_string()];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(bucket_fmt.to_string())];

    if let Some(from) = date_from {
        conditions.push("created_at >= ?".to_string());
        params_vec.push(Box::new(from.format(DATE_FMT).to_string()));
    }
    if let Some(to) = date_to {
        conditions.push("created_at < date(?, '+1 day')".to_string());
        params_vec.push(Box::new(to.format(DATE_FMT).to_string()));
    }

    let sql = format!(
        "SELECT strftime(?1, created_at) AS bucket,
                COUNT(*),
                COALESCE(SUM(total_amount), 0),
                COALESCE(AVG(total_amount), 0)
         FROM bookings
         WHERE {}
         GROUP BY bucket
         ORDER BY bucket DESC",
        conditions.join(" AND ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(RevenuePeriod {
            period: row.get(0)?,
            total_bookings: row.get(1)?,
            revenue: row.get(2)?,
            avg_booking_value: row.get(3)?,
        })
    })?;

    let mut periods = vec![];
    for row in rows {
        periods.push(row?);
    }
    Ok(periods)
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CottageOccupancy {
    pub cottage_name: String,
    pub cottage_type: String,
    pub total_bookings: i64,
    pub confirmed_bookings: i64,
    pub occupancy_rate: f64,
}

/// Per-cottage booking counts and confirmed share, optionally restricted
/// to stays inside a date window. Cottages with no bookings still appear.
pub fn occupancy_report(
    conn: &Connection,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) -> anyhow::Result<Vec<CottageOccupancy>> {
    let mut join_conditions = vec!["c.id = b.cottage_id".to_string()];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(from) = date_from {
        join_conditions.push("b.check_in_date >= ?".to_string());
        params_vec.push(Box::new(from.format(DATE_FMT).to_string()));
    }
    if let Some(to) = date_to {
        join_conditions.push("b.check_out_date <= ?".to_string());
        params_vec.push(Box::new(to.format(DATE_FMT).to_string()));
    }

    let sql = format!(
        "SELECT c.name, c.type,
                COUNT(b.id),
                COUNT(CASE WHEN b.status = 'confirmed' THEN 1 END),
                ROUND(COUNT(CASE WHEN b.status = 'confirmed' THEN 1 END) * 100.0
                      / MAX(COUNT(b.id), 1), 2)
         FROM cottages c
         LEFT JOIN bookings b ON {}
         WHERE c.is_active = 1
         GROUP BY c.id, c.name, c.type
         ORDER BY 5 DESC, c.name ASC",
        join_conditions.join(" AND ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(CottageOccupancy {
            cottage_name: row.get(0)?,
            cottage_type: row.get(1)?,
            total_bookings: row.get(2)?,
            confirmed_bookings: row.get(3)?,
            occupancy_rate: row.get(4)?,
        })
    })?;

    let mut cottages = vec![];
    for row in rows {
        cottages.push(row?);
    }
    Ok(cottages)
}

// ── Payments ──

pub fn insert_payment(conn: &Connection, payment: &Payment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payments (id, booking_id, amount, payment_method, external_order_id, external_payment_id, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            payment.id,
            payment.booking_id,
            payment.amount,
            payment.payment_method,
            payment.external_order_id,
            payment.external_payment_id,
            payment.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_payments_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, amount, payment_method, external_order_id, external_payment_id, status, created_at
         FROM payments WHERE booking_id = ?1 ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![booking_id], |row| {
        let status: String = row.get(6)?;
        let created_at: String = row.get(7)?;
        Ok(Payment {
            id: row.get(0)?,
            booking_id: row.get(1)?,
            amount: row.get(2)?,
            payment_method: row.get(3)?,
            external_order_id: row.get(4)?,
            external_payment_id: row.get(5)?,
            status: PaymentRecordStatus::parse(&status),
            created_at: parse_datetime(&created_at),
        })
    })?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row?);
    }
    Ok(payments)
}

pub fn mark_successful_payments_refunded(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<i64> {
    let count = conn.execute(
        "UPDATE payments SET status = 'refunded' WHERE booking_id = ?1 AND status = 'successful'",
        params![booking_id],
    )?;
    Ok(count as i64)
}

pub fn count_successful_payments(conn: &Connection, booking_id: &str) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM payments WHERE booking_id = ?1 AND status = 'successful'",
        params![booking_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
