diesel::table! {
    products (id) {
        id -> Int4,
        name -> Varchar,
        code -> Varchar,
        quantity -> Int4,
        supplier -> Varchar,
        image -> Nullable<Varchar>,
        stock -> Int4,
    }
}

diesel::table! {
    orders (id) {
        id -> Int4,
        product_name -> Varchar,
        product_code -> Varchar,
        quantity -> Int4,
        order_date -> Timestamptz,
        due_date -> Date,
        status -> Varchar,
        project_name -> Varchar,
        project_code -> Varchar,
        order_name -> Varchar,
        project_phase -> Varchar,
        project_consultant -> Varchar,
        project_location -> Varchar,
    }
}

diesel::allow_tables_to_appear_in_same_query!(products, orders);
