//! Built-in sample content shown when a collection has nothing to offer.

use chrono::{DateTime, TimeZone, Utc};

use crate::feedback_model::FeedbackRecord;
use crate::gallery_model::GalleryRecord;
use crate::service_model::ServiceRecord;
use crate::settings_model::{AboutCopy, BusinessInfo, HeroCopy, SiteCopy};

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

fn service(id: &str, title: &str, description: &str, icon: &str) -> ServiceRecord {
    ServiceRecord {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        icon_name: icon.to_string(),
        image_url: None,
        category: None,
        created_at: None,
    }
}

pub fn default_services() -> Vec<ServiceRecord> {
    vec![
        service(
            "tents",
            "Wedding Tent & Mandap",
            "Luxurious waterproof German hangars, traditional mandaps, and elegant piping setups.",
            "Tent",
        ),
        service(
            "decor",
            "Wedding Decoration",
            "Premium stage decor, entrance gates, and themed setups for your big day.",
            "Crown",
        ),
        service(
            "floral",
            "Floral Decoration",
            "Fresh and artificial flower arrangements for cars, stages, and venues.",
            "Flower2",
        ),
        service(
            "lighting",
            "Lighting & Draping",
            "Spectacular LED walls, chandeliers, fairy lights, and colorful fabric draping.",
            "Lightbulb",
        ),
        service(
            "party",
            "Birthday & Parties",
            "Balloon decor, cartoon themes, and fun setups for birthdays and anniversaries.",
            "Music",
        ),
        service(
            "corporate",
            "Corporate Events",
            "Professional setups for conferences, meetings, and political gatherings.",
            "CalendarDays",
        ),
        service(
            "management",
            "Event Management",
            "End-to-end planning and execution so you can enjoy your function stress-free.",
            "Star",
        ),
        service(
            "catering",
            "Catering Services",
            "Delicious vegetarian menus, sweet packs, fruit stalls, and professional waiters.",
            "Utensils",
        ),
    ]
}

fn gallery_item(id: &str, category: &str, seed: &str, title: &str) -> GalleryRecord {
    GalleryRecord {
        id: id.to_string(),
        title: title.to_string(),
        category: category.to_string(),
        image_url: format!("https://picsum.photos/seed/{seed}/600/400"),
        created_at: None,
    }
}

pub fn default_gallery() -> Vec<GalleryRecord> {
    vec![
        gallery_item("1", "Wedding", "wed1", "Royal Stage"),
        gallery_item("2", "Tent", "tent1", "Entrance Walkway"),
        gallery_item("3", "Lighting", "light1", "Night Ambience"),
        gallery_item("4", "Wedding", "wed2", "Mandap Setup"),
        gallery_item("5", "Party", "party1", "Birthday Theme"),
        gallery_item("6", "Tent", "tent2", "Dining Area Tent"),
        gallery_item("7", "Lighting", "light2", "LED Passage"),
        gallery_item("8", "Wedding", "wed3", "Floral Wall"),
    ]
}

pub fn default_testimonials() -> Vec<FeedbackRecord> {
    vec![
        FeedbackRecord {
            id: "1".to_string(),
            name: "Rahul Sharma".to_string(),
            rating: 5,
            text: "Excellent decoration and timely service. The team made my sister's wedding look like a royal event. Very professional!".to_string(),
            created_at: month_start(2023, 12),
        },
        FeedbackRecord {
            id: "2".to_string(),
            name: "Amit Patel".to_string(),
            rating: 4,
            text: "Great tent arrangements for our community program. The pricing is also very reasonable compared to others in Umariya.".to_string(),
            created_at: month_start(2024, 1),
        },
        FeedbackRecord {
            id: "3".to_string(),
            name: "Priya Singh".to_string(),
            rating: 5,
            text: "Loved the floral decor for my engagement. They listened to all my requirements and delivered perfectly.".to_string(),
            created_at: month_start(2024, 2),
        },
    ]
}

pub fn default_business_info() -> BusinessInfo {
    BusinessInfo {
        name: "Azad Tent House".to_string(),
        address: "Ward No 4, Near Lal Masjid, Chopra Molalla, Chandia, Umariya-484660, MP".to_string(),
        phone: "+91 98765 43210".to_string(),
        whatsapp: "919876543210".to_string(),
        email: "contact@azadtenthouse.com".to_string(),
        instagram: "https://www.instagram.com/azadtenthousechandia".to_string(),
        maps_link: "https://www.google.com/maps/embed?pb=!1m18!1m12!1m3!1d3663.0!2d80.0!3d23.0!2m3!1f0!2f0!3f0!3m2!1i1024!2i768!4f13.1!3m3!1m2!1s0x0%3A0x0!2zMTPCsDM5JzAwLjAiTiA4MMKwNDEnMDAuMCJF!5e0!3m2!1sen!2sin!4v1600000000000!5m2!1sen!2sin".to_string(),
        rating: 4.6,
    }
}

pub fn default_site_copy() -> SiteCopy {
    SiteCopy {
        hero: HeroCopy {
            tagline: "The Art of Celebration".to_string(),
            title_line1: "Royal Weddings".to_string(),
            title_line2: "& Unforgettable Events".to_string(),
            description: "Azad Tent House brings cinematic elegance to Chandia. From grand German hangars to intimate floral mandaps, we craft experiences that linger in memory.".to_string(),
        },
        about: AboutCopy {
            title_start: "We Don't Just Plan Events, We Design".to_string(),
            title_highlight: "Experiences".to_string(),
            description: "Azad Tent House stands as a beacon of luxury and reliability in Chandia. We specialize in transforming ordinary spaces into breathtaking venues.".to_string(),
            years_experience: "25+".to_string(),
            clients_count: "1k+".to_string(),
        },
    }
}
